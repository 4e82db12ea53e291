use clap::Parser;

#[tokio::main]
async fn main() -> sift_worker::Result<()> {
	sift_worker::run(sift_worker::Args::parse()).await
}
