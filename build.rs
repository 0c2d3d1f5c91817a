use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    // Copy templates, game tables and config next to the executable
    let Some(target_dir) = target_dir() else {
        println!("cargo:warning=Could not find target directory, resources not copied");
        return;
    };
    copy_resources(&target_dir, "templates");
    copy_resources(&target_dir, "data");
    copy_config(&target_dir);
}

/// OUT_DIR is something like target/release/build/essence-recognizer-xxx/out.
/// Going up 3 levels gives target/release (or target/debug).
fn target_dir() -> Option<PathBuf> {
    let out_dir = env::var("OUT_DIR").ok()?;
    Path::new(&out_dir).ancestors().nth(3).map(Path::to_path_buf)
}

/// Copies `resources/<name>` so the executable finds it at `<exe_dir>/resources/<name>`.
fn copy_resources(target_dir: &Path, name: &str) {
    let src = Path::new("resources").join(name);
    if src.exists() {
        copy_dir_recursive(&src, &target_dir.join("resources").join(name));
        println!("cargo:rerun-if-changed=resources/{}/", name);
    }
}

/// Recursively copies a directory and its contents.
fn copy_dir_recursive(src: &Path, dst: &Path) {
    let _ = fs::create_dir_all(dst);

    if let Ok(entries) = fs::read_dir(src) {
        for entry in entries.flatten() {
            let src_path = entry.path();
            let dst_path = dst.join(entry.file_name());

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path);
            } else {
                let _ = fs::copy(&src_path, &dst_path);
            }
        }
    }
}

/// Copies a checked-in config.json, if any. Otherwise defaults are written at first start.
fn copy_config(target_dir: &Path) {
    let config_src = Path::new("config.json");
    if config_src.exists() {
        let _ = fs::copy(config_src, target_dir.join("config.json"));
        println!("cargo:rerun-if-changed=config.json");
    }
}
