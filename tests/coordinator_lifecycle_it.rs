mod common;

// std
use std::time::Duration as StdDuration;
// crates.io
use serde_json::json;
// self
use appauth_coordinator::{
	Coordinator, CoordinatorState,
	error::{ChannelError, ConfigError, Error},
	intercept::StrategyKind,
	ledger::{LedgerKey, SessionLedger},
};
use common::*;

#[tokio::test]
async fn bootstrap_configures_both_contexts_and_the_interceptor() {
	let (harness, env) = Harness::new(config(), Interception::Shared);
	let (harness, coordinator) = harness.start(env).await;

	assert_eq!(coordinator.state(), CoordinatorState::Ready);
	assert_eq!(coordinator.strategy(), Some(StrategyKind::Shared));

	let redirect = harness.config.redirect_uri.clone();

	assert_eq!(harness.auth.attached(), vec![redirect.clone()]);
	assert_eq!(harness.request.attached(), vec![redirect]);

	let configure = harness.auth.tagged("appAuth-config");

	assert_eq!(configure.len(), 1);
	assert_eq!(configure[0]["config"]["scopes"], "openid read write");
	assert_eq!(configure[0]["config"]["clientId"], "spa-client");

	let shared = harness.shared.as_ref().expect("Shared registry should exist.");
	let interceptor_config = shared.interceptor().history();

	assert_eq!(shared.registrations(), 1);
	assert_eq!(interceptor_config[0]["message"], "configuration");
	assert_eq!(interceptor_config[0]["resourceServers"], json!([API1, API2]));
}

#[tokio::test]
async fn ready_waits_for_the_request_routing_context() {
	let (harness, env) = Harness::with_contexts(
		config(),
		Interception::Direct,
		|auth| auth,
		|request| request.manual_load(),
		"",
	);
	let coordinator = Coordinator::new(harness.config.clone(), harness.handlers(), env);
	let bootstrap = tokio::spawn({
		let coordinator = coordinator.clone();

		async move { coordinator.bootstrap().await }
	});

	settle().await;
	assert_eq!(coordinator.state(), CoordinatorState::AwaitingReadiness);
	assert_eq!(harness.direct.as_ref().map(|d| d.creations()), Some(0));

	harness.request.signal_loaded();
	bootstrap
		.await
		.expect("Bootstrap task should not panic.")
		.expect("Bootstrap should complete once both contexts are ready.");

	assert_eq!(coordinator.state(), CoordinatorState::Ready);
	assert_eq!(coordinator.strategy(), Some(StrategyKind::Direct));
}

#[tokio::test]
async fn readiness_timeout_fails_bootstrap() {
	let (harness, env) = Harness::with_contexts(
		config(),
		Interception::Direct,
		|auth| auth.manual_load(),
		|request| request,
		"",
	);
	let coordinator = Coordinator::new(harness.config.clone(), harness.handlers(), env);
	let err = coordinator.bootstrap().await.expect_err("A silent context should time out.");

	assert!(matches!(err, Error::ReadinessTimeout { context: "background auth", .. }));
	assert_eq!(coordinator.state(), CoordinatorState::Uninitialized);

	harness.auth.signal_loaded();
	coordinator.bootstrap().await.expect("A retry should succeed once the context loads.");

	assert_eq!(coordinator.state(), CoordinatorState::Ready);
	assert_eq!(harness.auth.attached().len(), 2);
}

#[tokio::test]
async fn missing_interception_support_is_fatal() {
	let (harness, env) = Harness::new(config(), Interception::None);
	let err = Coordinator::start(harness.config.clone(), harness.handlers(), env)
		.await
		.expect_err("Bootstrap without any interception strategy must fail.");

	assert!(matches!(err, Error::Config(ConfigError::NoInterceptionStrategy)));
}

#[tokio::test]
async fn registration_failure_falls_back_to_direct_exactly_once() {
	let (harness, env) = Harness::new(config(), Interception::FailingSharedWithDirect);
	let (harness, coordinator) = harness.start(env).await;
	let shared = harness.shared.as_ref().expect("Shared registry should exist.");
	let direct = harness.direct.as_ref().expect("Direct factory should exist.");

	assert_eq!(coordinator.strategy(), Some(StrategyKind::Direct));
	assert_eq!(shared.registrations(), 1);
	assert_eq!(direct.creations(), 1);
	assert_eq!(direct.resource_servers(), vec![rs(API1), rs(API2)]);
}

#[tokio::test]
async fn silent_shared_interceptor_times_out_instead_of_falling_back() {
	let (harness, env) = Harness::new(config(), Interception::SilentShared);
	let err = Coordinator::start(harness.config.clone(), harness.handlers(), env)
		.await
		.expect_err("An unresponsive shared interceptor should time out.");

	assert!(matches!(err, Error::ReadinessTimeout { context: "shared interceptor", .. }));
}

#[tokio::test]
async fn bootstrap_clears_a_stale_renewal_slot() {
	let (harness, env) = Harness::new(config(), Interception::Direct);

	harness
		.ledger
		.set(&LedgerKey::RenewalSlot, API1.to_owned())
		.await
		.expect("Seeding the ledger should succeed.");

	let (harness, coordinator) = harness.start(env).await;

	assert_eq!(
		harness.ledger.get(&LedgerKey::RenewalSlot).await.expect("Ledger read should succeed."),
		None
	);
	assert_eq!(
		coordinator.governor().snapshot().await.expect("Snapshot should load.").occupant,
		None
	);
}

#[tokio::test]
async fn operations_are_rejected_outside_ready() {
	let (harness, env) = Harness::new(config(), Interception::Direct);
	let coordinator = Coordinator::new(harness.config.clone(), harness.handlers(), env);

	assert!(matches!(
		coordinator.get_tokens(),
		Err(Error::InvalidState { state: CoordinatorState::Uninitialized, operation: "get_tokens" })
	));
	assert!(matches!(coordinator.logout().await, Err(Error::InvalidState { .. })));

	coordinator.bootstrap().await.expect("Bootstrap should succeed.");
	coordinator.get_tokens().expect("Tokens may be requested once ready.");

	assert_eq!(harness.auth.tagged("appAuth-getAvailableData").len(), 1);
	assert!(matches!(
		coordinator.bootstrap().await,
		Err(Error::InvalidState { state: CoordinatorState::Ready, operation: "bootstrap" })
	));
}

#[tokio::test]
async fn tokens_available_reaches_the_handler() {
	let (harness, env) = Harness::new(config(), Interception::Direct);
	let (harness, coordinator) = harness.start(env).await;

	coordinator.get_tokens().expect("Tokens may be requested once ready.");
	harness.notify(json!({
		"message": "appAuth-tokensAvailable",
		"idTokenClaims": { "sub": "user-1" }
	}));

	eventually("the tokens-available handler", || harness.claims.lock().len() == 1).await;

	let claims = harness.claims.lock()[0].clone().expect("Claims should be forwarded.");

	assert_eq!(claims.subject(), Some("user-1"));
}

#[tokio::test]
async fn logout_waits_for_completion_and_returns_to_uninitialized() {
	let (harness, env) = Harness::new(config(), Interception::Direct);
	let (harness, coordinator) = harness.start(env).await;
	let logout = tokio::spawn({
		let coordinator = coordinator.clone();

		async move { coordinator.logout().await }
	});

	eventually("the logout command", || harness.auth.tagged("appAuth-logout").len() == 1).await;
	assert_eq!(coordinator.state(), CoordinatorState::LoggingOut);
	assert!(!logout.is_finished());

	harness.notify(json!({ "message": "appAuth-logoutComplete" }));
	tokio::time::timeout(StdDuration::from_secs(1), logout)
		.await
		.expect("Logout should resolve after completion.")
		.expect("Logout task should not panic.")
		.expect("Logout should succeed.");

	assert_eq!(coordinator.state(), CoordinatorState::Uninitialized);
	assert_eq!(coordinator.strategy(), None);
	assert!(matches!(coordinator.get_tokens(), Err(Error::InvalidState { .. })));
}

#[tokio::test]
async fn logout_completion_from_a_foreign_origin_is_ignored() {
	let (harness, env) = Harness::new(config(), Interception::Direct);
	let (harness, coordinator) = harness.start(env).await;
	let logout = tokio::spawn({
		let coordinator = coordinator.clone();

		async move { coordinator.logout().await }
	});

	eventually("the logout command", || harness.auth.tagged("appAuth-logout").len() == 1).await;
	harness.notify_from(foreign_origin(), json!({ "message": "appAuth-logoutComplete" }));
	settle().await;

	assert!(!logout.is_finished());
	assert_eq!(coordinator.state(), CoordinatorState::LoggingOut);

	harness.notify(json!({ "message": "appAuth-logoutComplete" }));
	logout.await.expect("Logout task should not panic.").expect("Logout should succeed.");
}

#[tokio::test]
async fn bootstrap_after_logout_returns_to_ready() {
	let (harness, env) = Harness::new(config(), Interception::Direct);
	let (harness, coordinator) = harness.start(env).await;
	let logout = tokio::spawn({
		let coordinator = coordinator.clone();

		async move { coordinator.logout().await }
	});

	eventually("the logout command", || harness.auth.tagged("appAuth-logout").len() == 1).await;
	harness.notify(json!({ "message": "appAuth-logoutComplete" }));
	logout.await.expect("Logout task should not panic.").expect("Logout should succeed.");

	assert_eq!(coordinator.state(), CoordinatorState::Uninitialized);

	coordinator.bootstrap().await.expect("Bootstrap should succeed after logout.");

	assert_eq!(coordinator.state(), CoordinatorState::Ready);
	assert_eq!(coordinator.strategy(), Some(StrategyKind::Direct));
	assert_eq!(harness.direct.as_ref().map(|d| d.creations()), Some(2));

	// The page channel is handed to the new event loop.
	harness.notify(json!({ "message": "appAuth-tokensAvailable" }));
	eventually("the tokens-available handler", || harness.claims.lock().len() == 1).await;
}

#[tokio::test]
async fn logout_tears_down_when_the_acknowledgement_channel_closes() {
	let (harness, env) = Harness::new(config(), Interception::Direct);
	let (harness, coordinator) = harness.start(env).await;
	let logout = tokio::spawn({
		let coordinator = coordinator.clone();

		async move { coordinator.logout().await }
	});

	eventually("the logout command", || harness.auth.tagged("appAuth-logout").len() == 1).await;
	drop(harness.window);

	let err = tokio::time::timeout(StdDuration::from_secs(1), logout)
		.await
		.expect("Logout should resolve once the page channel closes.")
		.expect("Logout task should not panic.")
		.expect_err("Logout without an acknowledgement must fail.");

	assert!(matches!(err, Error::Channel(ChannelError::Closed { .. })));
	assert_eq!(coordinator.state(), CoordinatorState::Uninitialized);
	assert_eq!(coordinator.strategy(), None);
	assert_eq!(
		coordinator.governor().snapshot().await.expect("Snapshot should load.").occupant,
		None
	);
}
