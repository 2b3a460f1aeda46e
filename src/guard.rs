//! Navigation guards: authentication, guest-only, and one-time link checks.
//!
//! [`RouteGuard::check`] turns a [`Route`] description into a [`GuardDecision`]. A route
//! requiring authentication without a live token triggers one proactive refresh through
//! the shared [`RefreshCoordinator`], joining any refresh already in flight. Link-gated
//! routes validate their one-time token exactly once and never refresh or retry.

// self
use crate::{
	_prelude::*,
	auth::credentials::TokenPayload,
	config::{AuthEndpoints, GuardRoutes},
	http::{ApiRequest, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::RefreshCoordinator,
};

/// Families of one-time links delivered by email.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkGateKind {
	/// Email-verification link.
	EmailVerification,
	/// Password-reset link.
	PasswordReset,
}
impl LinkGateKind {
	/// Returns the validation endpoint for this link family.
	pub fn endpoint(self, endpoints: &AuthEndpoints) -> &str {
		match self {
			Self::EmailVerification => &endpoints.validate_email_verification_token,
			Self::PasswordReset => &endpoints.validate_password_reset_token,
		}
	}
}
impl Display for LinkGateKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Self::EmailVerification => "email verification",
			Self::PasswordReset => "password reset",
		})
	}
}

/// One-time link token a route must validate before it may render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkGate {
	/// Link family.
	pub kind: LinkGateKind,
	/// Token carried by the link, usually a query parameter; `None` when absent.
	pub token: Option<String>,
}
impl LinkGate {
	/// Gate for an email-verification link.
	pub fn email_verification(token: Option<impl Into<String>>) -> Self {
		Self { kind: LinkGateKind::EmailVerification, token: token.map(Into::into) }
	}

	/// Gate for a password-reset link.
	pub fn password_reset(token: Option<impl Into<String>>) -> Self {
		Self { kind: LinkGateKind::PasswordReset, token: token.map(Into::into) }
	}
}

/// Guard-relevant description of a navigation target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Route {
	/// Target path; informational only.
	pub path: String,
	/// Route is only reachable with a live session.
	pub requires_auth: bool,
	/// Route is only reachable without a session (sign-in, sign-up).
	pub requires_guest: bool,
	/// One-time link the route must validate first.
	pub gate: Option<LinkGate>,
}
impl Route {
	/// Unrestricted route.
	pub fn public(path: impl Into<String>) -> Self {
		Self { path: path.into(), ..Default::default() }
	}

	/// Route requiring an authenticated session.
	pub fn authenticated(path: impl Into<String>) -> Self {
		Self { requires_auth: true, ..Self::public(path) }
	}

	/// Route reserved for signed-out users.
	pub fn guest(path: impl Into<String>) -> Self {
		Self { requires_guest: true, ..Self::public(path) }
	}

	/// Attaches a one-time link gate.
	pub fn with_gate(mut self, gate: LinkGate) -> Self {
		self.gate = Some(gate);

		self
	}
}

/// Outcome of a guard evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
	/// Navigation may proceed.
	Allow,
	/// Navigation must go to the contained path instead.
	Redirect(String),
}
impl GuardDecision {
	/// Returns `true` for [`GuardDecision::Allow`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow)
	}
}

/// Evaluates [`Route`]s against the shared session.
pub struct RouteGuard<T>
where
	T: ?Sized + HttpTransport,
{
	coordinator: Arc<RefreshCoordinator<T>>,
	endpoints: AuthEndpoints,
	routes: GuardRoutes,
}
impl<T> RouteGuard<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a guard over the coordinator that owns the session.
	pub fn new(
		coordinator: Arc<RefreshCoordinator<T>>,
		endpoints: AuthEndpoints,
		routes: GuardRoutes,
	) -> Self {
		Self { coordinator, endpoints, routes }
	}

	/// Redirect targets used by this guard.
	pub fn routes(&self) -> &GuardRoutes {
		&self.routes
	}

	/// Decides whether navigation to `route` may proceed.
	///
	/// Checks run in order: authentication, guest-only, link gate. The first redirect wins.
	pub async fn check(&self, route: &Route) -> GuardDecision {
		const KIND: FlowKind = FlowKind::Guard;

		let span = FlowSpan::new(KIND, "check");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let decision = span.instrument(self.decide(route)).await;
		let outcome =
			if decision.is_allowed() { FlowOutcome::Success } else { FlowOutcome::Failure };

		span.record_outcome(outcome);
		obs::record_flow_outcome(KIND, outcome);

		decision
	}

	async fn decide(&self, route: &Route) -> GuardDecision {
		let store = self.coordinator.store();

		if route.requires_auth
			&& !store.is_authenticated()
			&& self.coordinator.refresh_session().await.is_err()
		{
			return GuardDecision::Redirect(self.routes.sign_in.clone());
		}
		if route.requires_guest && store.is_authenticated() {
			return GuardDecision::Redirect(self.routes.home.clone());
		}
		if let Some(gate) = &route.gate {
			let transport = &**self.coordinator.transport();
			let validated = match gate.token.as_deref() {
				Some(token) => validate_link_token(transport, &self.endpoints, gate.kind, token)
					.await
					.is_ok(),
				None => false,
			};

			if !validated {
				return GuardDecision::Redirect(self.routes.expired_link.clone());
			}
		}

		GuardDecision::Allow
	}
}
impl<T> Debug for RouteGuard<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RouteGuard").field("routes", &self.routes).finish()
	}
}

/// Checks a one-time link token with the backend.
///
/// The call carries no bearer and is never retried. Any non-2xx status, transport failure,
/// blank token, or an envelope whose `data` is `false` rejects the token.
pub(crate) async fn validate_link_token<T>(
	transport: &T,
	endpoints: &AuthEndpoints,
	kind: LinkGateKind,
	token: &str,
) -> Result<()>
where
	T: ?Sized + HttpTransport,
{
	let rejected = || Error::ValidationTokenExpired { gate: kind };

	if token.trim().is_empty() {
		return Err(rejected());
	}

	let request = ApiRequest::post(kind.endpoint(endpoints))
		.with_json(&TokenPayload { token })?;
	let response = transport.send(&request, None).await.map_err(|_| rejected())?;
	let verdict = response.json::<ValidationEnvelope>().ok();

	match verdict.and_then(|envelope| envelope.data) {
		Some(serde_json::Value::Bool(false)) => Err(rejected()),
		_ => Ok(()),
	}
}

#[derive(Deserialize)]
struct ValidationEnvelope {
	#[serde(default)]
	data: Option<serde_json::Value>,
}
