use tally_agent::app::AgentApp;

#[tokio::main]
async fn main() {
    if let Err(e) = AgentApp::run().await {
        eprintln!("\nError: {:#}\n", e);
        std::process::exit(1);
    }
}
