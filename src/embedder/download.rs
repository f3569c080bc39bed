/// Model file auto-download from HuggingFace.
///
/// Fetches the ONNX export and tokenizer of an e5 model when they are missing
/// locally. Bare model names resolve under `intfloat/`. Each file is streamed to a `.part` sibling and
/// renamed into place, so an interrupted download never leaves a truncated
/// `model.onnx` behind.
use std::fs;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

const HF_ORG: &str = "intfloat";

/// Files required for the embedder, with their paths inside the HF repo.
const MODEL_FILES: &[(&str, &str)] = &[
    ("model.onnx", "onnx/model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
    ("config.json", "config.json"),
    ("special_tokens_map.json", "special_tokens_map.json"),
    ("tokenizer_config.json", "tokenizer_config.json"),
];

fn file_url(model_name: &str, repo_path: &str) -> String {
    let repo = if model_name.contains('/') {
        model_name.to_string()
    } else {
        format!("{HF_ORG}/{model_name}")
    };
    format!("https://huggingface.co/{repo}/resolve/main/{repo_path}")
}

/// Check whether all required model files exist in `model_dir`.
#[must_use]
pub fn all_files_present(model_dir: &Path) -> bool {
    MODEL_FILES
        .iter()
        .all(|(name, _)| model_dir.join(name).exists())
}

/// Download the files of `model_name` from HuggingFace into `model_dir` if
/// any are missing.
pub fn download_model_files(model_dir: &Path, model_name: &str) -> Result<()> {
    if all_files_present(model_dir) {
        info!("All model files found in {}", model_dir.display());
        return Ok(());
    }
    anyhow::ensure!(!model_name.trim().is_empty(), "model name is empty");

    fs::create_dir_all(model_dir)
        .with_context(|| format!("failed to create models directory: {}", model_dir.display()))?;

    info!("Downloading {model_name} from HuggingFace (one-time, ~450MB)");

    for &(filename, repo_path) in MODEL_FILES {
        let dest = model_dir.join(filename);
        if dest.exists() {
            continue;
        }

        let url = file_url(model_name, repo_path);
        info!("Downloading {filename}...");
        download_file(&dest, &url).with_context(|| format!("failed to download {filename}"))?;
    }

    info!("Model download complete");
    Ok(())
}

/// Download a single file with a progress bar.
fn download_file(dest: &Path, url: &str) -> Result<()> {
    let resp =
        reqwest::blocking::get(url).with_context(|| format!("HTTP request failed: {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("bad status: {} for {url}", resp.status());
    }

    let pb = match resp.content_length() {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")?
                    .progress_chars("█▓░"),
            );
            pb
        }
        _ => ProgressBar::new_spinner(),
    };

    let part = dest.with_extension("part");
    let file = fs::File::create(&part)
        .with_context(|| format!("failed to create file: {}", part.display()))?;
    let mut writer = BufWriter::new(file);
    let mut reader = pb.wrap_read(resp);
    std::io::copy(&mut reader, &mut writer).context("failed to stream response body")?;
    drop(writer);
    pb.finish_and_clear();

    fs::rename(&part, dest)
        .with_context(|| format!("failed to move {} into place", part.display()))?;
    Ok(())
}
