//! The install pipeline.
//!
//! detect → resolve deps → build → identity → files → service → cleanup →
//! summary. Any error aborts the run; the build workspace is removed on the
//! way out either way.

use anyhow::Result;
use host_provision::deps::{build_tools, java_runtime};
use host_provision::{build, detect, Host, Resolver};
use tracing::info;

use crate::color;
use crate::provision;
use crate::service;
use crate::settings::{Layout, ServiceIdentity, Settings};

pub fn run(host: &dyn Host, settings: &Settings, layout: &Layout, id: &ServiceIdentity) -> Result<()> {
    let env = detect(host)?;

    let resolver = Resolver::new(host);
    resolver.resolve(&java_runtime(&env))?;
    resolver.ensure_all(&build_tools(&env))?;

    let output = build(host, &settings.build_request(layout))?;

    provision::ensure_identity(host, id)?;
    provision::ensure_directories(layout)?;
    provision::place_artifact(layout, &output.artifact)?;
    let config_written = provision::write_config(layout, settings)?;
    provision::place_unit(layout, &output.unit_template)?;
    provision::converge_ownership(host, layout, id)?;

    service::register(host, layout)?;

    output.workspace.release();
    info!("Install complete");
    print_summary(layout, settings, config_written);
    Ok(())
}

fn print_summary(layout: &Layout, settings: &Settings, config_written: bool) {
    let unit = layout.unit_name.trim_end_matches(".service");
    let config_note = if config_written { "" } else { "  (kept existing)" };

    println!();
    println!("{}", color::bold_green("✓ socks-lb installed."));
    println!();
    println!("  {:<12} {}", "binary", layout.artifact_path().display());
    println!("  {:<12} {}{}", "config", layout.config_path().display(), color::dim(config_note));
    println!("  {:<12} {}", "logs", layout.log_dir.display());
    println!("  {:<12} {}", "unit", layout.unit_path().display());
    println!(
        "  {:<12} {}:{} → 127.0.0.1:{}",
        "listening",
        settings.listen_host,
        settings.listen_port,
        settings.upstream_port
    );
    println!();
    println!("{}", color::yellow("The service is enabled but not running. Next steps:"));
    println!("  {}   {}", color::cyan(&format!("sudoedit {}", layout.config_path().display())), color::dim("# review proxies"));
    println!("  {}", color::cyan(&format!("sudo systemctl start {}", unit)));
    println!("  {}", color::cyan(&format!("systemctl status {}", unit)));
    println!("  {}", color::cyan(&format!("journalctl -u {} -f", unit)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_provision::testing::{fail, ok, ok_stderr, RecordingHost};
    use host_provision::Cmd;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    const DEBIAN: &str = "ID=debian\nVERSION_ID=\"12\"\nVERSION_CODENAME=bookworm\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n";

    /// A Debian host with no Java: apt installs work, the clone lays down the
    /// unit file, the build writes the jar. Records the workspace path.
    fn debian_host(workspace: Rc<RefCell<Option<PathBuf>>>, build_writes_jar: bool) -> RecordingHost {
        let host = RecordingHost::new();
        host.with_file("/etc/os-release", DEBIAN).with_program("apt-get");
        host.respond("java -version", vec![ok_stderr("openjdk version \"17.0.9\" 2023-10-17")])
            .on("apt-get install", |h, cmd: &Cmd| {
                for pkg in cmd.get_args() {
                    match pkg.as_str() {
                        "openjdk-17-jdk-headless" => { h.with_program("java"); }
                        "maven" => { h.with_program("mvn"); }
                        "git" | "curl" => { h.with_program(pkg); }
                        _ => {}
                    }
                }
                ok()
            })
            .on("getent", |_, _| fail(2, ""))
            .on("git clone", move |_, cmd: &Cmd| {
                let dest = PathBuf::from(cmd.get_args().last().unwrap());
                *workspace.borrow_mut() = dest.parent().map(Path::to_path_buf);
                std::fs::create_dir_all(&dest).unwrap();
                std::fs::write(dest.join("socks-lb.service"), "[Unit]\nDescription=socks-lb\n").unwrap();
                ok()
            })
            .on("mvn", move |_, cmd: &Cmd| {
                if build_writes_jar {
                    let target = cmd.get_dir().unwrap().join("target");
                    std::fs::create_dir_all(&target).unwrap();
                    std::fs::write(target.join("socks-lb.jar"), b"PK").unwrap();
                }
                ok()
            });
        host
    }

    #[test]
    fn test_fresh_debian_install() {
        let root = tempfile::tempdir().unwrap();
        let layout = Layout::rooted(root.path());
        let workspace = Rc::new(RefCell::new(None));
        let host = debian_host(workspace.clone(), true);
        let settings = Settings { listen_port: 8080, upstream_port: 1080, ..Settings::default() };

        run(&host, &settings, &layout, &ServiceIdentity::standard()).unwrap();

        assert!(host.ran("apt-get install -y -q openjdk-17-jdk-headless"));
        assert!(host.ran("useradd --system"));
        assert!(host.ran("systemctl enable socks-lb.service"));
        assert!(!host.ran("systemctl start"));

        let config = std::fs::read_to_string(layout.config_path()).unwrap();
        assert!(config.contains("listen_port: 8080"));
        let doc: serde_yaml::Value = serde_yaml::from_str(&config).unwrap();
        assert_eq!(doc["proxies"][0]["config"]["port"].as_u64(), Some(1080));

        assert!(layout.artifact_path().is_file());
        assert!(layout.unit_path().is_file());
        let ws = workspace.borrow().clone().unwrap();
        assert!(!ws.exists(), "workspace {} survived", ws.display());
    }

    #[test]
    fn test_missing_artifact_stops_before_provisioning() {
        let root = tempfile::tempdir().unwrap();
        let layout = Layout::rooted(root.path());
        let workspace = Rc::new(RefCell::new(None));
        let host = debian_host(workspace.clone(), false);

        let err = run(&host, &Settings::default(), &layout, &ServiceIdentity::standard()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<host_provision::ProvisionError>(),
            Some(host_provision::ProvisionError::Build(host_provision::BuildError::MissingArtifact(_)))
        ));
        assert!(!host.ran("useradd"));
        assert!(!layout.install_dir.exists());
        let ws = workspace.borrow().clone().unwrap();
        assert!(!ws.exists());
    }

    #[test]
    fn test_interrupt_during_build_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let layout = Layout::rooted(root.path());
        let workspace = Rc::new(RefCell::new(None));
        let host = debian_host(workspace.clone(), true);
        host.interrupt("mvn");

        let err = run(&host, &Settings::default(), &layout, &ServiceIdentity::standard()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<host_provision::ProvisionError>(),
            Some(host_provision::ProvisionError::Interrupted)
        ));
        assert!(!host.ran("useradd"));
        assert!(!layout.install_dir.exists());
        let ws = workspace.borrow().clone().unwrap();
        assert!(!ws.exists(), "workspace {} survived", ws.display());
    }

    #[test]
    fn test_unsupported_host_fails_first() {
        let root = tempfile::tempdir().unwrap();
        let layout = Layout::rooted(root.path());
        let host = RecordingHost::new();
        let err = run(&host, &Settings::default(), &layout, &ServiceIdentity::standard()).unwrap_err();
        assert!(err.to_string().contains("no supported package manager"));
        assert!(host.commands().is_empty());
    }
}
