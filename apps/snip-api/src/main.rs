use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = snip_api::Args::parse();
	snip_api::run(args).await
}
