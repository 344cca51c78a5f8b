#![no_main]

use libfuzzer_sys::fuzz_target;

// Writes arbitrary text as a config file and resolves it. Loading may fail,
// but never panic.
fuzz_target!(|content: &str| {
    let dir = std::env::temp_dir().join("hotdylib-fuzz");
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let path = dir.join("hotdylib.toml");
    if std::fs::write(&path, content).is_err() {
        return;
    }

    let loaded = hotdylib::ConfigLoader::new()
        .file(&path)
        .without_dotenv()
        .load();
    if let Ok(config) = loaded {
        if let Some(directory) = config.directory() {
            assert!(directory.as_path().is_absolute());
        }
        let _ = config.sources().to_string();
    }
});
