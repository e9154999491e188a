use newsbot::llm::answer::AnswerSettings;
use newsbot::llm::remote::RemoteLlmProvider;
use newsbot::sessions::Session;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let api_key = std::env::var("GROQ_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .unwrap_or_default();
    if api_key.is_empty() {
        eprintln!("Set GROQ_API_KEY or OPENAI_API_KEY environment variable");
        std::process::exit(1);
    }

    // Allow custom base URL or use the Groq default
    let base_url = std::env::var("LLM_BASE_URL")
        .unwrap_or_else(|_| common::DEFAULT_COMPLETION_URL.to_string());

    let model = std::env::var("LLM_MODEL")
        .unwrap_or_else(|_| common::DEFAULT_COMPLETION_MODEL.to_string());

    println!("\n{}", "=".repeat(60));
    println!("Testing LLM Provider");
    println!("Base URL: {}", base_url);
    println!("Model: {}", model);
    println!("{}", "=".repeat(60));

    let provider = RemoteLlmProvider::new(&base_url, &api_key, &model);
    let settings = AnswerSettings::default();

    let test_article = r#"
Rust is a systems programming language that runs blazingly fast, prevents
segfaults, and guarantees thread safety. It accomplishes these goals through
a unique ownership system that enforces memory safety without requiring a
garbage collector. Many companies are adopting Rust for critical
infrastructure, including Mozilla, Dropbox, and Microsoft.
    "#;

    let mut session = Session::new();
    if let Err(e) = session.load_document("https://example.com/rust", Ok(test_article.to_string())) {
        eprintln!("✗ Failed to load sample article: {}", e);
        return;
    }

    let questions = [
        // Answerable from the article
        "Which companies are adopting Rust?",
        // Not in the article: the model should say so
        "Who won the 2022 football world cup?",
    ];

    for (i, question) in questions.iter().enumerate() {
        println!("\n[Test {}] {}", i + 1, question);
        match session.ask(&provider, &settings, question).await {
            Ok(reply) if reply.error => eprintln!("✗ Failed: {}", reply.content),
            Ok(reply) => {
                println!("✓ Success!");
                println!("  Answer: {}", reply.content);
            }
            Err(e) => eprintln!("✗ Rejected: {}", e),
        }
    }

    println!("\n  Transcript now holds {} messages", session.transcript().len());
    println!("\n{}", "=".repeat(60));
    println!("Tests completed");
    println!("{}", "=".repeat(60));
}
