use std::sync::Mutex;

use tempfile::NamedTempFile;

use lotwatch::config::LotwatchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LOTWATCH_CONFIG",
        "LOTWATCH_MASK_PATH",
        "LOTWATCH_SOURCE",
        "LOTWATCH_SAMPLE_STEP",
        "LOTWATCH_DIFF_THRESHOLD",
        "LOTWATCH_BACKEND",
        "LOTWATCH_MODEL_PATH",
        "LOTWATCH_OUTPUT_DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "mask": {
            "path": "masks/lot_a.png",
            "min_spot_area": 80
        },
        "source": {
            "locator": "frames/lot_a",
            "sample_step": 15,
            "queue_depth": 4
        },
        "classifier": {
            "backend": "stub",
            "input_width": 32,
            "input_height": 32,
            "invert": true
        },
        "diff_threshold": 0.25,
        "annotate": {
            "output_dir": "out/lot_a"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("LOTWATCH_CONFIG", file.path());
    std::env::set_var("LOTWATCH_SOURCE", "stub://override");
    std::env::set_var("LOTWATCH_SAMPLE_STEP", "5");

    let cfg = LotwatchConfig::load().expect("load config");

    assert_eq!(cfg.mask.path.to_str().unwrap(), "masks/lot_a.png");
    assert_eq!(cfg.mask.min_spot_area, 80);
    assert_eq!(cfg.source.locator, "stub://override");
    assert_eq!(cfg.source.sample_step, 5);
    assert_eq!(cfg.source.queue_depth, Some(4));
    assert_eq!(cfg.classifier.backend, "stub");
    assert_eq!(cfg.classifier.input_width, 32);
    assert!(cfg.classifier.invert);
    assert!((cfg.diff_threshold - 0.25).abs() < f32::EPSILON);
    assert_eq!(cfg.annotate.output_dir.unwrap().to_str().unwrap(), "out/lot_a");

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = LotwatchConfig::load().expect("load config");

    assert_eq!(cfg.source.locator, "stub://lot");
    assert_eq!(cfg.source.sample_step, 30);
    assert_eq!(cfg.source.queue_depth, None);
    assert_eq!(cfg.classifier.backend, "stub");
    assert_eq!(cfg.classifier.input_width, 15);
    assert_eq!(cfg.classifier.input_height, 15);
    assert!(!cfg.classifier.invert);
    assert!((cfg.diff_threshold - 0.4).abs() < f32::EPSILON);

    clear_env();
}

#[test]
fn out_of_range_threshold_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LOTWATCH_DIFF_THRESHOLD", "1.5");
    assert!(LotwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn zero_sample_step_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LOTWATCH_SAMPLE_STEP", "0");
    assert!(LotwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn tract_backend_requires_a_model_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LOTWATCH_BACKEND", "tract");
    assert!(LotwatchConfig::load().is_err());

    std::env::set_var("LOTWATCH_MODEL_PATH", "models/occupancy.onnx");
    let cfg = LotwatchConfig::load().expect("load config");
    assert_eq!(cfg.classifier.backend, "tract");
    assert_eq!(
        cfg.classifier.model_path.unwrap().to_str().unwrap(),
        "models/occupancy.onnx"
    );

    clear_env();
}
