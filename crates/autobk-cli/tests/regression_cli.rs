use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const E0: f64 = 8979.0;

fn stage_spectrum(path: &Path) {
    let etok = 1.0 / 3.809_980_849_311_092;
    let mut table = String::from("# synthetic Cu-edge spectrum\n");
    for i in 0..900 {
        let energy = E0 - 100.0 + i as f64;
        let mu = if energy < E0 {
            0.2 + 1.0e-4 * (energy - E0)
        } else {
            let k = (etok * (energy - E0)).sqrt();
            1.2 - 2.0e-2 * k + 0.3 * (5.0 * k).sin() * (-0.02 * k * k).exp()
        };
        table.push_str(&format!("{energy:.4} {mu:.10}\n"));
    }
    fs::write(path, table).expect("spectrum should be staged");
}

fn run_autobk(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_autobk-rs"))
        .args(args)
        .output()
        .expect("binary should run")
}

#[test]
fn run_command_writes_all_artifacts() {
    let temp = TempDir::new().expect("tempdir should be created");
    let data = temp.path().join("spectrum.dat");
    let out_dir = temp.path().join("out");
    stage_spectrum(&data);

    let output = run_autobk(&[
        "run",
        "--data",
        data.to_str().expect("utf-8 path"),
        "--out-dir",
        out_dir.to_str().expect("utf-8 path"),
        "--e0",
        "8979",
        "--edge-step",
        "1.0",
        "--no-uncertainties",
    ]);

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(
        String::from_utf8_lossy(&output.stdout).contains("autobk:"),
        "stdout should summarize the fit"
    );

    for artifact in ["bkg.dat", "chi.dat", "autobk.json"] {
        let path = out_dir.join(artifact);
        assert!(path.is_file(), "artifact '{artifact}' should exist");
        assert!(
            !fs::read(&path).expect("artifact readable").is_empty(),
            "artifact '{artifact}' should not be empty"
        );
    }

    let report: Value = serde_json::from_str(
        &fs::read_to_string(out_dir.join("autobk.json")).expect("report readable"),
    )
    .expect("report should be valid JSON");
    assert_eq!(report["edge"]["e0"], serde_json::json!(8979.0));
    assert!(report["diagnostics"]["n_evaluations"].as_u64().expect("nfev") > 0);

    // bkg.dat: one row per input point plus the header.
    let bkg_lines = fs::read_to_string(out_dir.join("bkg.dat"))
        .expect("bkg readable")
        .lines()
        .count();
    assert_eq!(bkg_lines, 900 + 1);
}

#[test]
fn run_is_deterministic_for_identical_inputs() {
    let temp = TempDir::new().expect("tempdir should be created");
    let data = temp.path().join("spectrum.dat");
    stage_spectrum(&data);

    let first_out = temp.path().join("first");
    let second_out = temp.path().join("second");
    for out_dir in [&first_out, &second_out] {
        let output = run_autobk(&[
            "run",
            "--data",
            data.to_str().expect("utf-8 path"),
            "--out-dir",
            out_dir.to_str().expect("utf-8 path"),
            "--e0",
            "8979",
            "--edge-step",
            "1.0",
        ]);
        assert!(output.status.success());
    }

    for artifact in ["bkg.dat", "chi.dat", "autobk.json"] {
        let first = fs::read(first_out.join(artifact)).expect("first artifact");
        let second = fs::read(second_out.join(artifact)).expect("second artifact");
        assert_eq!(first, second, "artifact '{artifact}' should be deterministic");
    }
}

#[test]
fn unrecognized_config_key_aborts_before_fitting() {
    let temp = TempDir::new().expect("tempdir should be created");
    let data = temp.path().join("spectrum.dat");
    let config = temp.path().join("config.json");
    let out_dir = temp.path().join("out");
    stage_spectrum(&data);
    fs::write(&config, r#"{"rbgk": 1.2}"#).expect("config staged");

    let output = run_autobk(&[
        "run",
        "--data",
        data.to_str().expect("utf-8 path"),
        "--config",
        config.to_str().expect("utf-8 path"),
        "--out-dir",
        out_dir.to_str().expect("utf-8 path"),
    ]);

    assert_eq!(output.status.code(), Some(2), "input errors exit with 2");
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("rbgk"),
        "diagnostic should name the unrecognized key"
    );
    assert!(!out_dir.exists(), "no artifacts before validation passes");
}

#[test]
fn missing_data_file_reports_an_internal_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = run_autobk(&[
        "run",
        "--data",
        temp.path().join("absent.dat").to_str().expect("utf-8 path"),
    ]);

    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("absent.dat"),
        "diagnostic should name the missing file"
    );
}

#[test]
fn windows_command_lists_the_recognized_names() {
    let output = run_autobk(&["windows"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["hanning", "parzen", "welch", "sine", "gaussian"] {
        assert!(stdout.contains(name), "missing window '{name}'");
    }
}
