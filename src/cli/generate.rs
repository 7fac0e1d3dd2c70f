// src/cli/generate.rs — Generation commands: reply, suggest, scenario, image, teaser

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::generation::{GenerationFacade, TeaserTicker};
use crate::provider::{ConversationTurn, ImagePayload};

/// Read a JSON transcript: `[{"role":"user","text":"..."}, ...]`. `bot` is
/// accepted as the assistant role.
pub fn load_transcript(path: &Path) -> anyhow::Result<Vec<ConversationTurn>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading transcript {}", path.display()))?;
    let turns: Vec<ConversationTurn> = serde_json::from_str(&content)
        .with_context(|| format!("parsing transcript {}", path.display()))?;
    Ok(turns)
}

pub async fn run_reply(
    facade: &GenerationFacade,
    transcript: &Path,
    system: &str,
    preferred: Option<&str>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let history = load_transcript(transcript)?;
    let reply = facade
        .generate_reply(&history, system, preferred, cancel)
        .await;
    println!("{reply}");
    Ok(())
}

pub async fn run_suggest(
    facade: &GenerationFacade,
    transcript: &Path,
    system: &str,
    preferred: Option<&str>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let history = load_transcript(transcript)?;
    let suggestion = facade
        .generate_suggestion(&history, system, preferred, cancel)
        .await;
    println!("{suggestion}");
    Ok(())
}

pub async fn run_scenario(
    facade: &GenerationFacade,
    personality: &str,
    theme: Option<&str>,
    preferred: Option<&str>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let line = facade
        .generate_scenario(personality, theme, preferred, cancel)
        .await;
    println!("{line}");
    Ok(())
}

pub async fn run_image(
    facade: &GenerationFacade,
    prompt: &str,
    reference: Option<&Path>,
    out: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let reference = match reference {
        Some(path) => Some(load_image(path).await?),
        None => None,
    };

    let generated = facade
        .generate_image(prompt, reference.as_ref(), cancel)
        .await?;

    tokio::fs::write(out, &generated.payload.bytes)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    eprintln!(
        "  {} ({}, {} bytes) via {}",
        out.display(),
        generated.payload.mime_type,
        generated.payload.bytes.len(),
        generated.provider
    );
    Ok(())
}

async fn load_image(path: &Path) -> anyhow::Result<ImagePayload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading reference image {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    Ok(ImagePayload::new(bytes, ImagePayload::mime_for_extension(ext)))
}

pub async fn run_teaser(
    facade: &GenerationFacade,
    personality: &str,
    watch: bool,
    interval_secs: u64,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    if !watch {
        println!("{}", facade.generate_teaser(personality).await);
        return Ok(());
    }

    let ticker = TeaserTicker::new(Duration::from_secs(interval_secs));
    ticker
        .run(facade, personality, cancel, |teaser| println!("{teaser}"))
        .await;
    Ok(())
}
