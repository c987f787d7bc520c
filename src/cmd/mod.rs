use anyhow::{Context, Result};
use khmer_ner::app::NerPipeline;
use khmer_ner::core::segment;
use khmer_ner::envconfig::Settings;
use khmer_ner::fixtures::FixtureSpec;
use khmer_ner::{CharVocabulary, ModelBundle, WeightMap, WordSegmenter};
use std::path::Path;

pub async fn serve(settings: Settings) -> Result<()> {
    khmer_ner::app::serve(settings).await
}

fn segmenter(settings: &Settings) -> Result<WordSegmenter> {
    let inner = segment::from_spec(&settings.segmenter)
        .with_context(|| format!("invalid segmenter '{}'", settings.segmenter))?;
    Ok(WordSegmenter::new(inner))
}

pub async fn predict(settings: Settings, text: &str, json: bool) -> Result<()> {
    let segmenter = segmenter(&settings)?;
    let paths = settings.bundle_paths();
    let labels = settings.labels.clone();
    let device = settings.device;

    let bundle = tokio::task::spawn_blocking(move || ModelBundle::load(&paths, labels, device))
        .await?
        .context("failed to load models")?;
    let pipeline = NerPipeline::new(bundle.into()).segmenter(segmenter);

    let text = text.to_string();
    let entities = tokio::task::spawn_blocking(move || pipeline.predict(&text)).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&entities)?);
    } else {
        for token in &entities {
            println!("{}\t{}", token.word, token.label);
        }
    }
    Ok(())
}

pub fn segment(settings: &Settings, text: &str) -> Result<()> {
    let segmenter = segmenter(settings)?;
    let tokens = segmenter.segment(text);
    println!("{}", tokens.join(" "));
    Ok(())
}

pub fn inspect(settings: &Settings) -> Result<()> {
    let (device, spec) = settings
        .device
        .resolve()
        .with_context(|| format!("cannot open device {}", settings.device))?;
    println!("device: {}", spec);

    let vocab = CharVocabulary::load(&settings.char2idx_path)?;
    println!(
        "vocabulary: {} ({} entries, max id {})",
        settings.char2idx_path.display(),
        vocab.len(),
        vocab.max_id()
    );

    for path in [&settings.autoencoder_path, &settings.tagger_path] {
        print_weights(path, &device)?;
    }

    let bundle = ModelBundle::load(&settings.bundle_paths(), settings.labels.clone(), settings.device)
        .context("bundle does not fit together")?;
    println!("{}", serde_json::to_string_pretty(&bundle.info())?);
    Ok(())
}

fn print_weights(path: &Path, device: &candle_core::Device) -> Result<()> {
    let weights = WeightMap::load(path, device)?;
    println!("{} (sha256 {})", path.display(), weights.digest());
    for name in weights.names() {
        println!("  {:<40} {:?}", name, weights.dims(name)?);
    }
    Ok(())
}

pub fn scaffold(out: &Path, seed: u64) -> Result<()> {
    let paths = FixtureSpec::default()
        .seed(seed)
        .write_to(out)
        .with_context(|| format!("failed to write bundle to {}", out.display()))?;
    println!("vocabulary:  {}", paths.vocabulary.display());
    println!("autoencoder: {}", paths.autoencoder.display());
    println!("tagger:      {}", paths.tagger.display());
    Ok(())
}
