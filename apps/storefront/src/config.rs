use std::{collections::HashMap, fs};

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub entitlement_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: "demo_public_api_key".into(),
            entitlement_id: Some("premium".into()),
        }
    }
}

pub fn load_settings(path: &str) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_key") {
                settings.api_key = v.clone();
            }
            if let Some(v) = file_cfg.get("entitlement_id") {
                settings.entitlement_id = Some(v.clone());
            }
        }
    }

    if let Ok(v) = std::env::var("STOREFRONT_API_KEY") {
        settings.api_key = v;
    }
    if let Ok(v) = std::env::var("STOREFRONT_ENTITLEMENT_ID") {
        settings.entitlement_id = Some(v);
    }

    // A blank entitlement id disables subscription gating entirely.
    if settings
        .entitlement_id
        .as_deref()
        .is_some_and(|id| id.trim().is_empty())
    {
        settings.entitlement_id = None;
    }

    settings
}
