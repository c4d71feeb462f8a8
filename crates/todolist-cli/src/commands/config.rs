use std::path::Path;

use todolist_core::config::{non_blank, ClientConfig};

use crate::cli::ConfigCommands;
use crate::error::CliError;
use crate::settings::{default_settings_path, CliSettings};

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    run_config_at(command, &default_settings_path())
}

pub fn run_config_at(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    let mut settings = CliSettings::load_from_path(path).map_err(CliError::Config)?;

    match command {
        ConfigCommands::Show => {
            let effective = settings
                .apply_to(ClientConfig::from_env()?)
                .map_err(CliError::Config)?;
            for line in format_config_lines(&effective, path) {
                println!("{line}");
            }
            return Ok(());
        }
        ConfigCommands::SetServer { url } => {
            settings.set_server_url(&url).map_err(CliError::Config)?;
        }
        ConfigCommands::SetToken { token } => {
            let token = non_blank(Some(token))
                .ok_or_else(|| CliError::Config("Token cannot be empty".to_string()))?;
            settings.auth_token = Some(token);
        }
        ConfigCommands::ClearToken => settings.auth_token = None,
        ConfigCommands::Offline { state } => settings.offline_mode = state.is_on(),
    }

    settings.save_to_path(path).map_err(CliError::Config)?;
    println!("Saved {}", path.display());
    Ok(())
}

pub fn format_config_lines(config: &ClientConfig, path: &Path) -> Vec<String> {
    vec![
        format!("Config file:     {}", path.display()),
        format!(
            "Server:          {}",
            config.server_url.as_deref().unwrap_or("not configured")
        ),
        format!(
            "Auth token:      {}",
            if config.auth_token.is_some() {
                "set"
            } else {
                "not set"
            }
        ),
        format!(
            "Offline mode:    {}",
            if config.offline_mode { "on" } else { "off" }
        ),
        format!("Request timeout: {}s", config.request_timeout.as_secs()),
    ]
}
