//! Immutable credential values issued by login and renewal.

// self
use crate::{
	_prelude::*,
	auth::{SubjectId, TokenSecret},
};

/// Cached snapshot of the signed-in subject's profile, opaque to this crate.
pub type Profile = serde_json::Value;

/// Access + renewal token pair bound to a subject.
///
/// Values are never mutated in place: renewal produces a fresh credential through
/// [`Credential::rotate`], so a credential captured by an in-flight call stays stable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	access_token: TokenSecret,
	renewal_token: TokenSecret,
	subject_id: SubjectId,
	issued_at: OffsetDateTime,
}
impl Credential {
	/// Creates a credential issued now.
	pub fn new(
		access_token: impl Into<String>,
		renewal_token: impl Into<String>,
		subject_id: SubjectId,
	) -> Self {
		Self::issued_at(access_token, renewal_token, subject_id, OffsetDateTime::now_utc())
	}

	/// Creates a credential with an explicit issue instant.
	pub fn issued_at(
		access_token: impl Into<String>,
		renewal_token: impl Into<String>,
		subject_id: SubjectId,
		issued_at: OffsetDateTime,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			renewal_token: TokenSecret::new(renewal_token),
			subject_id,
			issued_at,
		}
	}

	/// Short-lived bearer token attached to every call.
	pub fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}

	/// Long-lived token exchanged for a new access token.
	pub fn renewal_token(&self) -> &TokenSecret {
		&self.renewal_token
	}

	/// Subject the credential was issued to.
	pub fn subject_id(&self) -> &SubjectId {
		&self.subject_id
	}

	/// Local instant at which the credential was received.
	pub fn when_issued(&self) -> OffsetDateTime {
		self.issued_at
	}

	/// Builds the credential that replaces `self` after a successful renewal.
	///
	/// A renewal response without a new renewal token keeps the current one.
	pub fn rotate(&self, access_token: impl Into<String>, renewal_token: Option<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			renewal_token: renewal_token
				.map(TokenSecret::new)
				.unwrap_or_else(|| self.renewal_token.clone()),
			subject_id: self.subject_id.clone(),
			issued_at: OffsetDateTime::now_utc(),
		}
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("renewal_token", &"<redacted>")
			.field("subject_id", &self.subject_id)
			.field("issued_at", &self.issued_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn fixture() -> Credential {
		let subject = SubjectId::new("user-1").expect("Subject fixture should be valid.");

		Credential::issued_at("T1", "R1", subject, time::macros::datetime!(2025-11-10 12:00 UTC))
	}

	#[test]
	fn rotate_builds_new_value_and_keeps_subject() {
		let original = fixture();
		let rotated = original.rotate("T2", Some("R2".into()));

		assert_eq!(original.access_token().expose(), "T1");
		assert_eq!(rotated.access_token().expose(), "T2");
		assert_eq!(rotated.renewal_token().expose(), "R2");
		assert_eq!(rotated.subject_id(), original.subject_id());
		assert!(rotated.when_issued() > original.when_issued());
	}

	#[test]
	fn rotate_without_renewal_token_keeps_previous_one() {
		let rotated = fixture().rotate("T2", None);

		assert_eq!(rotated.renewal_token().expose(), "R1");
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let rendered = format!("{:?}", fixture());

		assert!(!rendered.contains("T1"));
		assert!(!rendered.contains("R1"));
		assert!(rendered.contains("user-1"));
	}
}
