//! CLI definitions for socks-lb-installer.

use clap::Parser;

pub const DEFAULT_REPO_URL: &str = "https://github.com/socks-lb/socks-lb.git";

#[derive(Parser, Debug)]
#[clap(
    name = "socks-lb-installer",
    version,
    about = "Build socks-lb from source and install it as a systemd service\n\nDetects the distribution, installs Java 17+ and build tooling, builds the\nload balancer, creates the `socks-lb` system user, writes a default\nconfiguration and enables (but does not start) socks-lb.service.",
    long_about = None,
    after_help = "Environment variables:\n  LISTEN_PORT          port socks-lb listens on (default 1080)\n  UPSTREAM_PORT        port of the default direct upstream (default 9080)\n  LISTEN_HOST          bind address (default 0.0.0.0)\n  SOCKS_LB_REPO_URL    git repository to build from\n  SOCKS_LB_REPO_REF    branch or tag to build (default: remote HEAD)\n  REGENERATE_CONFIG    overwrite an existing config.yaml when set to 1/true/yes\n  RUST_LOG             log filter (default: info)"
)]
pub struct Cli {
    /// Stop and remove the service, its files and the service user
    #[clap(long, short)]
    pub uninstall: bool,

    /// Port socks-lb listens on
    #[clap(long, env = "LISTEN_PORT", default_value_t = 1080)]
    pub listen_port: u16,

    /// Port of the upstream the default `direct` proxy entry points at
    #[clap(long, env = "UPSTREAM_PORT", default_value_t = 9080)]
    pub upstream_port: u16,

    /// Address socks-lb binds to
    #[clap(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
    pub listen_host: String,

    /// Git repository to build from
    #[clap(long, env = "SOCKS_LB_REPO_URL", default_value = DEFAULT_REPO_URL)]
    pub repo_url: String,

    /// Branch or tag to build
    #[clap(long, env = "SOCKS_LB_REPO_REF")]
    pub repo_ref: Option<String>,

    /// Overwrite an existing config.yaml with freshly generated defaults
    #[clap(
        long,
        env = "REGENERATE_CONFIG",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub regenerate_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["socks-lb-installer"]).unwrap();
        assert!(!cli.uninstall);
        assert_eq!(cli.repo_url, DEFAULT_REPO_URL);
        assert!(cli.repo_ref.is_none());
    }

    #[test]
    fn test_uninstall_short_and_long() {
        assert!(Cli::try_parse_from(["x", "-u"]).unwrap().uninstall);
        assert!(Cli::try_parse_from(["x", "--uninstall"]).unwrap().uninstall);
    }

    #[test]
    fn test_port_flags() {
        let cli = Cli::try_parse_from(["x", "--listen-port", "8080", "--upstream-port", "1080"]).unwrap();
        assert_eq!(cli.listen_port, 8080);
        assert_eq!(cli.upstream_port, 1080);
    }

    #[test]
    fn test_help_is_a_display_request() {
        let err = Cli::try_parse_from(["x", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        let err = Cli::try_parse_from(["x", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Cli::try_parse_from(["x", "--listen-port", "70000"]).is_err());
    }

    #[test]
    fn test_regenerate_config_from_env() {
        assert!(Cli::try_parse_from(["x", "--regenerate-config"]).unwrap().regenerate_config);

        std::env::set_var("REGENERATE_CONFIG", "1");
        let on = Cli::try_parse_from(["x"]).map(|c| c.regenerate_config);
        std::env::set_var("REGENERATE_CONFIG", "0");
        let off = Cli::try_parse_from(["x"]).map(|c| c.regenerate_config);
        std::env::remove_var("REGENERATE_CONFIG");

        assert!(on.unwrap());
        assert!(!off.unwrap());
    }
}
