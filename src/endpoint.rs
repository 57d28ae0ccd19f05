//! Transport-agnostic auth endpoint service.
//!
//! [`AuthEndpoint`] implements the login/register/refresh/logout operations of
//! the wire protocol; the hosting HTTP framework only deserializes bodies,
//! extracts cookies, and maps [`Error`] values to status codes. Refresh-token
//! rotation happens here: the claim that authorizes a refresh consumes the
//! presented token in the same store operation that precedes minting its
//! replacement.

pub mod directory;
pub mod password;
pub mod wire;

pub use directory::*;
pub use password::*;
pub use wire::*;

// self
use crate::{
	_prelude::*,
	auth::{AccessClaims, UserId},
	issuer::TokenIssuer,
	obs::{self, PipelineKind},
	store::RefreshTokenStore,
};

/// Auth endpoint service bundling the issuer, token store, and user directory.
pub struct AuthEndpoint {
	issuer: TokenIssuer,
	store: Arc<dyn RefreshTokenStore>,
	directory: Arc<dyn UserDirectory>,
	vault: PasswordVault,
}
impl AuthEndpoint {
	/// Creates the service from its collaborators.
	pub fn new(
		issuer: TokenIssuer,
		store: Arc<dyn RefreshTokenStore>,
		directory: Arc<dyn UserDirectory>,
	) -> Self {
		Self { issuer, store, directory, vault: PasswordVault }
	}

	/// Issuer in use; hosts need it for TTLs when rendering cookies.
	pub fn issuer(&self) -> &TokenIssuer {
		&self.issuer
	}

	/// Authenticates a login request and establishes a session grant.
	pub async fn login(&self, request: LoginRequest) -> Result<SessionGrant> {
		obs::observe(PipelineKind::Login, "login", async {
			let account = self
				.directory
				.find_by_email(&request.email)
				.await
				.map_err(Error::from)?
				.ok_or(Error::InvalidCredentials)?;

			if !self.vault.verify(&request.password, &account.password_hash)? {
				return Err(Error::InvalidCredentials);
			}

			self.grant(account).await
		})
		.await
	}

	/// Registers a new account and establishes a session grant.
	pub async fn register(&self, request: RegisterRequest) -> Result<SessionGrant> {
		obs::observe(PipelineKind::Register, "register", async {
			let password_hash = self.vault.hash(&request.password)?;
			let account = self
				.directory
				.create(NewUserAccount {
					email: request.email,
					username: request.username,
					password_hash,
				})
				.await
				.map_err(Error::from)?;

			self.grant(account).await
		})
		.await
	}

	/// Rotates a refresh token: consumes the presented one, mints a new pair.
	///
	/// Fails with [`Error::InvalidRefreshToken`] when the presented value is
	/// unknown, expired, already rotated, or revoked by a logout.
	pub async fn refresh(&self, token_value: &str) -> Result<SessionGrant> {
		obs::observe(PipelineKind::Refresh, "refresh", async {
			let now = OffsetDateTime::now_utc();
			let record = self.store.claim(token_value, now).await?.into_record()?;
			let account = self
				.directory
				.find_by_id(record.user_id)
				.await
				.map_err(Error::from)?
				.ok_or(Error::InvalidRefreshToken)?;

			self.grant(account).await
		})
		.await
	}

	/// Revokes the presented refresh token. Idempotent; unknown values succeed.
	pub async fn logout(&self, token_value: &str) -> Result<()> {
		obs::observe(PipelineKind::Logout, "logout", async {
			self.store.revoke(token_value, OffsetDateTime::now_utc()).await?;

			Ok(())
		})
		.await
	}

	/// Revokes every live refresh token for the user; also the right call on
	/// password change or credential compromise. Returns how many were hit.
	pub async fn logout_all(&self, user_id: UserId) -> Result<usize> {
		obs::observe(PipelineKind::Logout, "logout_all", async {
			Ok(self.store.revoke_all_for_user(user_id, OffsetDateTime::now_utc()).await?)
		})
		.await
	}

	/// Verifies a bearer credential for protected routes.
	pub fn authenticate(&self, bearer: &str) -> Result<AccessClaims> {
		self.issuer.verify_access_token(bearer)
	}

	/// Purges expired and long-revoked records; meant for a periodic job,
	/// never the request path. Returns the number of rows removed.
	pub async fn cleanup(&self, now: OffsetDateTime) -> Result<usize> {
		Ok(self.store.cleanup(now).await?)
	}

	/// Renders the httpOnly cookie directives delivering a grant.
	pub fn cookies_for(&self, grant: &SessionGrant) -> CookieDirectives {
		CookieDirectives::for_grant(grant, self.issuer.access_ttl(), self.issuer.refresh_ttl())
	}

	async fn grant(&self, account: UserAccount) -> Result<SessionGrant> {
		let token = self.issuer.issue_access_token(account.id, &account.email, &account.username)?;
		let refresh_token = self
			.issuer
			.issue_refresh_token(self.store.as_ref(), account.id, OffsetDateTime::now_utc())
			.await?;

		Ok(SessionGrant {
			user: account.public(),
			token: token.expose().to_owned(),
			refresh_token: refresh_token.expose().to_owned(),
		})
	}
}
impl Debug for AuthEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthEndpoint").field("issuer", &self.issuer).finish()
	}
}
