//! Drives a coordinator against the in-memory host: bootstrap, one silent renewal, and logout.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::{Result, eyre::eyre};
use serde_json::json;
// self
use appauth_coordinator::{
	Coordinator, Handlers, HostEnvironment,
	channel::{WindowMessage, window_channel},
	config::Config,
	host::memory::{MemoryContext, MemoryDirectFactory, MemoryNavigator},
	intercept::InterceptionCapabilities,
	ledger::MemoryLedger,
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = Config::from_json_str(
		Url::parse("https://app.example.com/index.html")?,
		r#"{
			"clientId": "demo-spa",
			"authorizationEndpoint": "https://idp.example.com/authorize",
			"tokenEndpoint": "https://idp.example.com/token",
			"resourceServers": { "https://api.example.com/": "read write" }
		}"#,
	)?;
	let origin = config.redirect_origin();
	let auth = Arc::new(MemoryContext::new("background auth", origin.clone()));
	let direct = Arc::new(MemoryDirectFactory::default());
	let (window, window_rx) = window_channel();
	let env = HostEnvironment {
		auth_context: auth.clone(),
		request_context: Arc::new(MemoryContext::new("request routing", origin.clone())),
		navigator: Arc::new(MemoryNavigator::default()),
		ledger: Arc::new(MemoryLedger::default()),
		window: window_rx,
		interception: InterceptionCapabilities::default().with_direct(direct.clone()),
	};
	let handlers = Handlers::new(|claims| println!("tokens available: {claims:?}"));
	let coordinator = Coordinator::start(config, handlers, env).await?;

	println!("coordinator {:?} using {:?}", coordinator.state(), coordinator.strategy());

	direct.emit(json!({ "message": "renewTokens", "resourceServer": "https://api.example.com/" }), Vec::new())?;
	tokio::time::sleep(Duration::from_millis(50)).await;
	println!("renewal commands sent: {}", auth.tagged("appAuth-getFreshAccessToken").len());

	window.send(WindowMessage::new(
		origin.clone(),
		json!({ "message": "appAuth-tokensAvailable", "resourceServer": "https://api.example.com/" }),
	))
	.map_err(|_| eyre!("page channel closed"))?;
	tokio::time::sleep(Duration::from_millis(50)).await;
	println!("interceptor notified for: {:?}", direct.renewed());

	let logout = tokio::spawn({
		let coordinator = coordinator.clone();

		async move { coordinator.logout().await }
	});

	tokio::time::sleep(Duration::from_millis(50)).await;
	window.send(WindowMessage::new(origin, json!({ "message": "appAuth-logoutComplete" })))
		.map_err(|_| eyre!("page channel closed"))?;
	logout.await??;
	println!("coordinator {:?} after logout", coordinator.state());

	Ok(())
}
