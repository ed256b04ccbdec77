use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use strawberry_vision::config::Config;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "STRAWBERRY_CONFIG",
        "STRAWBERRY_MODEL",
        "STRAWBERRY_DATA_YAML",
        "STRAWBERRY_CLASS_NAMES",
        "STRAWBERRY_CONF_THRESHOLD",
        "STRAWBERRY_IOU_THRESHOLD",
        "STRAWBERRY_OUTPUT_DIR",
        "STRAWBERRY_FONT",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = Config::load().expect("load config");

    assert_eq!(cfg, Config::default());
    assert!(cfg.model_path.is_none());
    assert_eq!(cfg.detector.input_size, 640);
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{
            "model_path": "models/berries.onnx",
            "data_yaml": "configs/strawberry_data.yaml",
            "detector": {
                "input_size": 320,
                "confidence_threshold": 0.4,
                "iou_threshold": 0.5
            },
            "visualizer": {
                "show_id": false,
                "output_dir": "out/frames"
            },
            "pipeline": {
                "enable_logging": false
            }
        }"#,
    );

    std::env::set_var("STRAWBERRY_CONFIG", file.path());
    std::env::set_var("STRAWBERRY_CONF_THRESHOLD", "0.6");
    std::env::set_var("STRAWBERRY_MODEL", "/opt/models/best.onnx");
    std::env::set_var("STRAWBERRY_FONT", "/usr/share/fonts/DejaVuSans.ttf");

    let cfg = Config::load().expect("load config");

    assert_eq!(cfg.model_path, Some(PathBuf::from("/opt/models/best.onnx")));
    assert_eq!(
        cfg.data_yaml,
        Some(PathBuf::from("configs/strawberry_data.yaml"))
    );
    assert_eq!(cfg.detector.input_size, 320);
    assert_eq!(cfg.detector.confidence_threshold, 0.6);
    assert_eq!(cfg.detector.iou_threshold, 0.5);
    assert!(!cfg.visualizer.show_id);
    assert!(cfg.visualizer.show_confidence);
    assert_eq!(cfg.visualizer.output_dir, Some(PathBuf::from("out/frames")));
    assert_eq!(
        cfg.visualizer.font_path,
        Some(PathBuf::from("/usr/share/fonts/DejaVuSans.ttf"))
    );
    assert!(!cfg.pipeline.enable_logging);

    clear_env();
}

#[test]
fn loads_toml_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
class_names = ["strawberry", "flower"]

[detector]
iou_threshold = 0.3
"#,
    );
    std::env::set_var("STRAWBERRY_CONFIG", file.path());

    let cfg = Config::load().expect("load config");

    assert_eq!(cfg.class_names, vec!["strawberry", "flower"]);
    assert_eq!(cfg.detector.iou_threshold, 0.3);
    assert_eq!(cfg.detector.confidence_threshold, 0.25);

    clear_env();
}

#[test]
fn class_names_env_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("STRAWBERRY_CLASS_NAMES", "berry, leaf");
    let cfg = Config::load().expect("load config");
    assert_eq!(cfg.class_names, vec!["berry", "leaf"]);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("STRAWBERRY_IOU_THRESHOLD", "1.7");
    assert!(Config::load().is_err());
    std::env::remove_var("STRAWBERRY_IOU_THRESHOLD");

    std::env::set_var("STRAWBERRY_CONF_THRESHOLD", "high");
    assert!(Config::load().is_err());
    std::env::remove_var("STRAWBERRY_CONF_THRESHOLD");

    let file = config_file(".json", r#"{"detector": {"input_size": 500}}"#);
    std::env::set_var("STRAWBERRY_CONFIG", file.path());
    assert!(Config::load().is_err());

    let file = config_file(".json", "{ not json");
    std::env::set_var("STRAWBERRY_CONFIG", file.path());
    assert!(Config::load().is_err());

    std::env::set_var("STRAWBERRY_CONFIG", "/nonexistent/strawberry.json");
    assert!(Config::load().is_err());

    clear_env();
}
