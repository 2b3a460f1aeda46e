// self
use super::SessionClient;
use crate::{
	_prelude::*,
	auth::{
		LoginCredentials, PasswordReset, Registration, UserProfile,
		credentials::{EmailPayload, TokenPayload},
		token::decode_grant,
	},
	guard::{self, LinkGateKind},
	http::{ApiRequest, ApiResponse, HttpTransport},
	obs::{self, FlowKind},
	session::Session,
};

impl<T> SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Exchanges credentials for an access token and stores it.
	///
	/// The call bypasses the refresh coordinator: a `401` here means bad credentials and
	/// surfaces as [`Error::Http`], whose [`field_errors`](crate::error::HttpError::field_errors)
	/// carry the backend's per-field messages.
	pub async fn login(&self, credentials: &LoginCredentials) -> Result<Session> {
		obs::observe(FlowKind::Login, "login", async {
			let request =
				ApiRequest::post(self.config.endpoints.login.as_str()).with_json(credentials)?;
			let response = self.send_public(&request).await?;
			let token = decode_grant(&response)?
				.ok_or_else(|| Error::MissingAccessToken { path: response.path.clone() })?;

			self.store.replace(Some(token));

			Ok(self.store.get())
		})
		.await
	}

	/// Creates an account. The session is left untouched; sign-in follows email verification.
	pub async fn register(&self, registration: &Registration) -> Result<()> {
		obs::observe(FlowKind::Register, "register", async {
			let request =
				ApiRequest::post(self.config.endpoints.register.as_str()).with_json(registration)?;

			self.send_public(&request).await.map(drop)
		})
		.await
	}

	/// Revokes the session server-side and clears it locally.
	///
	/// The local session is cleared even when the server call fails; that failure is still
	/// returned.
	pub async fn logout(&self) -> Result<()> {
		obs::observe(FlowKind::Logout, "logout", async {
			let result = if self.store.is_authenticated() {
				self.coordinator
					.execute(ApiRequest::post(self.config.endpoints.logout.as_str()))
					.await
					.map(drop)
			} else {
				Ok(())
			};

			self.store.clear();

			result
		})
		.await
	}

	/// Restores the session at start-up.
	///
	/// Without a rehydrated token one refresh is attempted with the ambient refresh
	/// credential; a failed attempt leaves the session signed out and is logged. Use
	/// [`try_restore`](Self::try_restore) to inspect the failure.
	pub async fn restore(&self) -> Session {
		match self.try_restore().await {
			Ok(session) => session,
			Err(e) => {
				obs::trace_restore_failure(&e);

				self.store.get()
			},
		}
	}

	/// Same as [`restore`](Self::restore), but returns the refresh failure so a missing
	/// refresh cookie (`RefreshRejected`) can be told apart from an unreachable backend.
	pub async fn try_restore(&self) -> Result<Session> {
		if !self.store.is_authenticated() {
			self.coordinator.refresh_session().await?;
		}

		Ok(self.store.get())
	}

	/// Fetches the authenticated user's profile.
	pub async fn current_user(&self) -> Result<UserProfile> {
		obs::observe(FlowKind::Account, "current_user", async {
			let response =
				self.coordinator.execute(ApiRequest::get(self.config.endpoints.me.as_str())).await?;

			Ok(match response.json::<ProfileEnvelope>()? {
				ProfileEnvelope::Wrapped { data } => data,
				ProfileEnvelope::Bare(profile) => profile,
			})
		})
		.await
	}

	/// Checks an email-verification link token without consuming it.
	pub async fn validate_email_verification_token(&self, token: &str) -> Result<()> {
		self.validate_link(LinkGateKind::EmailVerification, token).await
	}

	/// Checks a password-reset link token without consuming it.
	pub async fn validate_password_reset_token(&self, token: &str) -> Result<()> {
		self.validate_link(LinkGateKind::PasswordReset, token).await
	}

	/// Confirms an email address with the token from the verification link.
	pub async fn verify_email(&self, token: &str) -> Result<()> {
		let path = self.config.endpoints.verify_email.as_str();

		self.account_call("verify_email", path, &TokenPayload { token }).await
	}

	/// Sends a fresh verification email.
	pub async fn resend_verification(&self, email: &str) -> Result<()> {
		let path = self.config.endpoints.resend_verification.as_str();

		self.account_call("resend_verification", path, &EmailPayload { email }).await
	}

	/// Requests a password-reset email.
	pub async fn forgot_password(&self, email: &str) -> Result<()> {
		let path = self.config.endpoints.forgot_password.as_str();

		self.account_call("forgot_password", path, &EmailPayload { email }).await
	}

	/// Sets a new password using the token from the reset link.
	pub async fn reset_password(&self, reset: &PasswordReset) -> Result<()> {
		let path = self.config.endpoints.reset_password.as_str();

		self.account_call("reset_password", path, reset).await
	}

	async fn validate_link(&self, kind: LinkGateKind, token: &str) -> Result<()> {
		obs::observe(FlowKind::ValidateLink, "validate_link", async {
			guard::validate_link_token(self.transport(), &self.config.endpoints, kind, token).await
		})
		.await
	}

	async fn account_call<B>(&self, stage: &'static str, path: &str, body: &B) -> Result<()>
	where
		B: ?Sized + Serialize,
	{
		obs::observe(FlowKind::Account, stage, async {
			let request = ApiRequest::post(path).with_json(body)?;

			self.send_public(&request).await.map(drop)
		})
		.await
	}

	/// Sends a call that needs no access token and must never trigger a refresh.
	async fn send_public(&self, request: &ApiRequest) -> Result<ApiResponse> {
		self.transport().send(request, None).await
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileEnvelope {
	Wrapped { data: UserProfile },
	Bare(UserProfile),
}
