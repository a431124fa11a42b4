//! hotel-cms binary entry point

fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    if let Err(e) = hotel_cms::cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
