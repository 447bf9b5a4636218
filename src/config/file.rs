use std::path::{Path, PathBuf};

/// Config file name searched for in the default locations.
pub const CONFIG_FILE_NAME: &str = "config.yml";

const SYSTEM_CONFIG_DIR: &str = "/etc/cloudflared";

/// Locations searched, in order, when no `--config` is given:
/// `~/.cloudflared`, `~/.cloudflare-warp`, `~/cloudflare-warp`,
/// then `/etc/cloudflared`.
#[must_use]
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = dirs::home_dir()
        .map(|home| {
            [".cloudflared", ".cloudflare-warp", "cloudflare-warp"]
                .iter()
                .map(|dir| home.join(dir).join(CONFIG_FILE_NAME))
                .collect()
        })
        .unwrap_or_default();
    paths.push(Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE_NAME));
    paths
}

/// First default location holding a config file, if any.
#[must_use]
pub fn find_default_config() -> Option<PathBuf> {
    default_config_paths().into_iter().find(|path| path.is_file())
}
