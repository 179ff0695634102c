mod common;

use assert_cmd::Command;
use bgone::{process, ForegroundColorSpec, Options};
use common::{
    assert_reconstructs_exactly, calculate_similarity_percentage, encode_png,
    overlay_on_background, save_png, two_patch_image,
};
use predicates::prelude::*;
use tempfile::TempDir;

fn decode_png(bytes: &[u8]) -> image::RgbaImage {
    image::load_from_memory(bytes)
        .expect("output must decode")
        .to_rgba8()
}

#[test]
fn test_deduce_two_unknown_colors() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("patches.png");
    let output_path = temp_dir.path().join("output.png");
    let original = two_patch_image([0, 0, 255], [0, 255, 0], [255, 255, 255]);
    save_png(&input_path, &original);

    bgone()
        .args([
            input_path.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--fg",
            "auto",
            "auto",
            "--bg",
            "#ffffff",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deduced 2 unknown colors"))
        .stdout(predicate::str::contains("#0000ff"))
        .stdout(predicate::str::contains("#00ff00"));

    let processed = image::open(&output_path).unwrap().to_rgba8();
    let reconstructed = overlay_on_background(&processed, [255, 255, 255]);
    let similarity = calculate_similarity_percentage(&original, &reconstructed);
    assert!(similarity > 99.0, "Similarity {:.4}% is too low", similarity);
}

#[test]
fn test_deduce_with_known_color_finds_the_other() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("patches.png");
    let output_path = temp_dir.path().join("output.png");
    save_png(
        &input_path,
        &two_patch_image([255, 0, 0], [0, 0, 255], [255, 255, 255]),
    );

    bgone()
        .args([
            input_path.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--fg",
            "#ff0000",
            "auto",
            "--bg",
            "#ffffff",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deduced 1 unknown color"))
        .stdout(predicate::str::contains("#0000ff"));
}

#[test]
fn test_deduction_through_the_library() {
    let background = [255, 255, 255];
    let original = two_patch_image([0, 0, 255], [0, 255, 0], background);
    let mut options = Options::new(encode_png(&original));
    options.background = Some(background);
    options.foreground = Some(vec![ForegroundColorSpec::Auto, ForegroundColorSpec::Auto]);

    let output = decode_png(&process(&options).unwrap());
    assert_reconstructs_exactly(&output, &original, background);
}

#[test]
fn test_insufficient_colors_fails() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("single.png");
    save_png(
        &input_path,
        &two_patch_image([255, 0, 0], [255, 0, 0], [255, 255, 255]),
    );

    bgone()
        .args([
            input_path.to_str().unwrap(),
            "--fg",
            "auto",
            "auto",
            "--bg",
            "#ffffff",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error: "))
        .stderr(predicate::str::contains("deduce"));
}

#[test]
fn test_insufficient_colors_through_the_library() {
    let original = two_patch_image([255, 0, 0], [255, 0, 0], [255, 255, 255]);
    let mut options = Options::new(encode_png(&original));
    options.background = Some([255, 255, 255]);
    options.foreground = Some(vec![ForegroundColorSpec::Auto, ForegroundColorSpec::Auto]);

    assert!(matches!(
        process(&options),
        Err(bgone::Error::InsufficientColors {
            requested: 2,
            found: 1
        })
    ));
}

fn bgone() -> Command {
    Command::cargo_bin("bgone").unwrap()
}
