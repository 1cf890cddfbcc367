use std::env;
use std::fs;
use std::path::Path;

fn main() {
    copy_config();
}

/// Copies config.json next to the built executable so the defaults ship with it.
fn copy_config() {
    let Ok(out_dir) = env::var("OUT_DIR") else {
        return;
    };
    // OUT_DIR is something like target/release/build/civ-matchup-xxx/out
    let Some(target_dir) = Path::new(&out_dir).ancestors().nth(3) else {
        return;
    };

    let config_src = Path::new("config.json");
    if config_src.exists() {
        let _ = fs::copy(config_src, target_dir.join("config.json"));
        println!("cargo:rerun-if-changed=config.json");
    }
}
