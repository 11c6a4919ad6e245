use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dsmlgate")]
#[command(about = "Runs a DSML v2 batch request against an LDAP directory server")]
#[command(version)]
pub struct CliArgs {
    /// Path to the DSML batch request file (reads stdin when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Directory server host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Directory server port
    #[arg(short, long, default_value = "389")]
    pub port: u16,

    /// Bind DN (empty for anonymous bind)
    #[arg(short = 'D', long, default_value = "")]
    pub bind_dn: String,

    /// Bind password
    #[arg(short = 'w', long, default_value = "")]
    pub password: String,

    /// Declared character encoding of the input document
    #[arg(long)]
    pub encoding: Option<String>,

    /// Pretty-print the batch response
    #[arg(long)]
    pub pretty: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Set log level: debug, info, warn, error
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub bind_dn: String,
    pub password: String,
    pub pretty: bool,
}

impl GatewayConfig {
    pub fn from_cli_args(args: &CliArgs) -> Self {
        GatewayConfig {
            host: args.host.clone(),
            port: args.port,
            bind_dn: args.bind_dn.clone(),
            password: args.password.clone(),
            pretty: args.pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["dsmlgate"]);
        let config = GatewayConfig::from_cli_args(&args);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 389);
        assert_eq!(config.bind_dn, "");
        assert!(!config.pretty);
        assert!(args.file.is_none());
    }

    #[test]
    fn test_full_invocation() {
        let args = CliArgs::parse_from([
            "dsmlgate",
            "--file",
            "batch.xml",
            "--host",
            "ldap.example.com",
            "--port",
            "10389",
            "-D",
            "cn=admin,dc=example,dc=com",
            "-w",
            "secret",
            "--pretty",
        ]);
        let config = GatewayConfig::from_cli_args(&args);
        assert_eq!(config.host, "ldap.example.com");
        assert_eq!(config.port, 10389);
        assert_eq!(config.bind_dn, "cn=admin,dc=example,dc=com");
        assert_eq!(config.password, "secret");
        assert!(config.pretty);
        assert_eq!(args.file.as_deref().unwrap().to_str(), Some("batch.xml"));
    }
}
