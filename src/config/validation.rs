//! Configuration validation functions.

use super::security::ClientAuthMode;
use super::Config;
use std::path::Path;

/// Validate configuration security and warn about potential credential leaks
pub fn validate_config_security(config: &Config) -> anyhow::Result<()> {
    let is_prod = is_production_mode();

    // Validate metrics authentication
    if config.security.require_metrics_auth {
        let token_present = config
            .security
            .metrics_auth_token
            .as_ref()
            .map(|t| !t.is_empty())
            .unwrap_or(false);

        if !token_present {
            anyhow::bail!(
                "\nCRITICAL: Metrics authentication is enabled but no credentials are configured!\n\
                 ===================================================================\n\
                 Configure a shared bearer token:\n\
                 export TANK_ROYALE__SECURITY__METRICS_AUTH_TOKEN=\"$(openssl rand -hex 32)\"\n\
                 \n\
                 To disable metrics auth (NOT recommended), set:\n\
                 export TANK_ROYALE__SECURITY__REQUIRE_METRICS_AUTH=false\n\
                 ===================================================================\n"
            );
        }

        if let Some(token) = &config.security.metrics_auth_token {
            if token.len() < 16 {
                eprintln!(
                    "\nWARNING: Metrics auth token is very short ({} chars).\n\
                     Recommended: At least 32 characters for security.\n\
                     Generate a strong token: openssl rand -hex 32\n",
                    token.len()
                );
            }
        }
    } else if is_prod {
        eprintln!(
            "\nSECURITY WARNING: Metrics Authentication Disabled in Production!\n\
             ===================================================================\n\
             Your /metrics endpoint is publicly accessible without authentication.\n\
             This exposes sensitive application data and usage statistics.\n\
             \n\
             To enable metrics authentication:\n\
             export TANK_ROYALE__SECURITY__REQUIRE_METRICS_AUTH=true\n\
             export TANK_ROYALE__SECURITY__METRICS_AUTH_TOKEN=\"$(openssl rand -hex 32)\"\n\
             ===================================================================\n"
        );
    }

    // Bearer token secret validation
    if config.security.require_websocket_auth && config.security.token_secret.is_empty() {
        anyhow::bail!(
            "\nCRITICAL: WebSocket authentication is enabled but no token secret is configured!\n\
             ===================================================================\n\
             Configure a signing secret:\n\
             export TANK_ROYALE__SECURITY__TOKEN_SECRET=\"$(openssl rand -hex 32)\"\n\
             ===================================================================\n"
        );
    } else if is_prod
        && config.security.require_websocket_auth
        && config.security.token_secret.len() < 16
    {
        eprintln!(
            "\nWARNING: security.token_secret is very short ({} chars).\n\
             Recommended: At least 32 characters for security.\n",
            config.security.token_secret.len()
        );
    }

    // TLS validation
    if config.security.transport.tls.enabled {
        let tls = &config.security.transport.tls;
        let cert_path = tls
            .certificate_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "security.transport.tls.certificate_path must be provided when TLS is enabled"
                )
            })?;
        if !Path::new(cert_path).exists() {
            anyhow::bail!("TLS certificate file not found at {cert_path}");
        }

        let key_path = tls
            .private_key_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "security.transport.tls.private_key_path must be provided when TLS is enabled"
                )
            })?;
        if !Path::new(key_path).exists() {
            anyhow::bail!("TLS private key file not found at {key_path}");
        }

        if matches!(
            tls.client_auth,
            ClientAuthMode::Optional | ClientAuthMode::Require
        ) {
            let ca_path = tls
                .client_ca_cert_path
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "security.transport.tls.client_ca_cert_path must be set when client_auth is {:?}",
                        tls.client_auth
                    )
                })?;
            if !Path::new(ca_path).exists() {
                anyhow::bail!("Client CA bundle not found at {ca_path}");
            }
        }
    }

    Ok(())
}

/// Detect if we're running in production mode.
///
/// Checks for `TANK_ROYALE__ENVIRONMENT` or generic `PRODUCTION` / `PROD` environment variables.
pub fn is_production_mode() -> bool {
    use std::env;

    if let Ok(mode) = env::var("TANK_ROYALE__ENVIRONMENT") {
        return mode.to_lowercase() == "production" || mode.to_lowercase() == "prod";
    }

    env::var("TANK_ROYALE_PRODUCTION").is_ok()
        || env::var("PRODUCTION").is_ok()
        || env::var("PROD").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_with_auth_disabled_passes() {
        let mut config = Config::default();
        config.security.require_websocket_auth = false;
        config.security.require_metrics_auth = false;
        assert!(validate_config_security(&config).is_ok());
    }

    #[test]
    fn websocket_auth_without_secret_fails() {
        let mut config = Config::default();
        config.security.require_websocket_auth = true;
        config.security.token_secret = String::new();
        assert!(validate_config_security(&config).is_err());
    }

    #[test]
    fn websocket_auth_with_secret_passes() {
        let mut config = Config::default();
        config.security.require_websocket_auth = true;
        config.security.require_metrics_auth = false;
        config.security.token_secret = "a-sufficiently-long-shared-secret".to_string();
        assert!(validate_config_security(&config).is_ok());
    }

    #[test]
    fn tls_enabled_without_cert_path_fails() {
        let mut config = Config::default();
        config.security.require_websocket_auth = false;
        config.security.require_metrics_auth = false;
        config.security.transport.tls.enabled = true;
        assert!(validate_config_security(&config).is_err());
    }
}
