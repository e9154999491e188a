use common::ExtractionConfig;
use newsbot::extraction::{ArticleExtractor, HttpExtractor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // URLs from the command line, or a few stable pages
    let mut urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        urls = vec![
            "https://www.rust-lang.org/".to_string(),
            "https://blog.rust-lang.org/".to_string(),
            "not a url".to_string(),
        ];
    }

    let extractor = HttpExtractor::new(&ExtractionConfig::default())?;

    for url in &urls {
        println!("\n{}", "=".repeat(60));
        println!("Extracting: {}", url);
        println!("{}", "=".repeat(60));

        match extractor.extract(url).await {
            Ok(text) => {
                println!("✓ Success!");
                println!("  Characters: {}", text.chars().count());
                println!("  Preview: {}...", text.chars().take(200).collect::<String>());
            }
            Err(e) => {
                println!("✗ Failed: {}", e);
            }
        }
    }

    Ok(())
}
