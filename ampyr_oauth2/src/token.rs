use ampyr_clock::{Clock, DurationSecs, System, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{AccessToken, AccessTokenRef, RefreshToken, RefreshTokenRef, Scope, ScopeRef};

/// An access token as stored in the cache, with its lifetime
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    access_token: AccessToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<RefreshToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<Scope>,
    lifetime: DurationSecs,
    issued: UnixTime,
    expiry: UnixTime,
}

/// Whether a cached token may still be used
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token is valid
    Valid,
    /// The token is no longer valid
    Expired,
}

impl TokenRecord {
    /// Constructs a record for a token issued at `issued` that is valid for `lifetime`
    pub fn new(
        access_token: AccessToken,
        refresh_token: Option<RefreshToken>,
        issued: UnixTime,
        lifetime: DurationSecs,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            scope: None,
            lifetime,
            issued,
            expiry: issued + lifetime,
        }
    }

    /// Records the scope granted by the authority
    pub fn with_scope(mut self, scope: Option<Scope>) -> Self {
        self.scope = scope;
        self
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the refresh token, if one was issued
    #[inline]
    pub fn refresh_token(&self) -> Option<&RefreshTokenRef> {
        self.refresh_token.as_deref()
    }

    /// Gets the scope granted, if the authority reported one
    #[inline]
    pub fn scope(&self) -> Option<&ScopeRef> {
        self.scope.as_deref()
    }

    /// Gets the token's lifetime
    #[inline]
    pub fn lifetime(&self) -> DurationSecs {
        self.lifetime
    }

    /// Gets the time that the token was issued
    #[inline]
    pub fn issued(&self) -> UnixTime {
        self.issued
    }

    /// Gets the time that the token will expire
    #[inline]
    pub fn expiry(&self) -> UnixTime {
        self.expiry
    }

    /// Gets the interval during which the token is valid
    #[inline]
    pub fn valid_interval(&self) -> std::ops::Range<UnixTime> {
        self.issued..self.expiry
    }

    /// Gets the token's status as of `time`
    ///
    /// A token is expired once fewer than `minimum_validity` seconds remain
    /// before its expiry. With no minimum, it expires exactly at its expiry.
    #[inline]
    pub fn status_at(&self, time: UnixTime, minimum_validity: DurationSecs) -> TokenStatus {
        if time + minimum_validity < self.expiry {
            TokenStatus::Valid
        } else {
            TokenStatus::Expired
        }
    }

    /// Gets a duration for how much longer the token would be valid as of
    /// the provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        self.expiry - time
    }

    pub(crate) fn into_access_token(self) -> AccessToken {
        self.access_token
    }
}

/// Configuration for computing token lifetimes and judging their validity
#[derive(Clone, Debug)]
pub struct TokenLifetimeConfig<C = System> {
    minimum_validity: DurationSecs,
    default_lifetime: DurationSecs,
    clock: C,
}

impl Default for TokenLifetimeConfig {
    /// Default lifetime configuration
    ///
    /// Tokens are valid until their expiry, tokens issued without an
    /// `expires_in` are assumed to live for one hour, and the system clock
    /// is used.
    fn default() -> Self {
        Self {
            minimum_validity: DurationSecs(0),
            default_lifetime: DurationSecs(3600),
            clock: System,
        }
    }
}

impl<C> TokenLifetimeConfig<C> {
    /// Treats tokens with less than `minimum_validity` remaining as expired
    pub fn with_minimum_validity(mut self, minimum_validity: DurationSecs) -> Self {
        self.minimum_validity = minimum_validity;
        self
    }

    /// Sets the lifetime assumed when the authority does not declare one
    pub fn with_default_lifetime(mut self, default_lifetime: DurationSecs) -> Self {
        self.default_lifetime = default_lifetime;
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenLifetimeConfig<D> {
        TokenLifetimeConfig {
            minimum_validity: self.minimum_validity,
            default_lifetime: self.default_lifetime,
            clock,
        }
    }

    /// The minimum remaining validity of a usable token
    #[inline]
    pub fn minimum_validity(&self) -> DurationSecs {
        self.minimum_validity
    }
}

impl<C: Clock> TokenLifetimeConfig<C> {
    /// The current time according to the configured clock
    #[inline]
    pub fn now(&self) -> UnixTime {
        self.clock.now()
    }

    /// Gets the status of `record` right now
    #[inline]
    pub fn status(&self, record: &TokenRecord) -> TokenStatus {
        record.status_at(self.now(), self.minimum_validity)
    }

    /// Constructs a record for a token issued now
    pub fn create_record(
        &self,
        access_token: AccessToken,
        refresh_token: Option<RefreshToken>,
        expires_in: Option<DurationSecs>,
    ) -> TokenRecord {
        let lifetime = expires_in.unwrap_or(self.default_lifetime);
        TokenRecord::new(access_token, refresh_token, self.now(), lifetime)
    }
}

#[cfg(test)]
mod tests {
    use ampyr_clock::TestClock;

    use super::*;

    fn record() -> TokenRecord {
        TokenRecord::new(
            AccessToken::from_static("access"),
            Some(RefreshToken::from_static("refresh")),
            UnixTime(1_000),
            DurationSecs(100),
        )
    }

    #[test]
    fn expires_exactly_at_expiry() {
        let record = record();

        assert_eq!(record.expiry(), UnixTime(1_100));
        assert_eq!(record.status_at(UnixTime(1_099), DurationSecs(0)), TokenStatus::Valid);
        assert_eq!(record.status_at(UnixTime(1_100), DurationSecs(0)), TokenStatus::Expired);
        assert_eq!(record.status_at(UnixTime(5_000), DurationSecs(0)), TokenStatus::Expired);
    }

    #[test]
    fn minimum_validity_expires_early() {
        let record = record();

        assert_eq!(record.status_at(UnixTime(1_089), DurationSecs(10)), TokenStatus::Valid);
        assert_eq!(record.status_at(UnixTime(1_090), DurationSecs(10)), TokenStatus::Expired);
    }

    #[test]
    fn remaining_validity_saturates() {
        let record = record();

        assert_eq!(record.until_expired_at(UnixTime(1_040)), DurationSecs(60));
        assert_eq!(record.until_expired_at(UnixTime(2_000)), DurationSecs(0));
    }

    #[test]
    fn records_use_declared_or_default_lifetime() {
        let config = TokenLifetimeConfig::default()
            .with_default_lifetime(DurationSecs(600))
            .with_clock(TestClock::new(UnixTime(50)));

        let declared = config.create_record(
            AccessToken::from_static("a"),
            None,
            Some(DurationSecs(30)),
        );
        let assumed = config.create_record(AccessToken::from_static("b"), None, None);

        assert_eq!(declared.valid_interval(), UnixTime(50)..UnixTime(80));
        assert_eq!(assumed.expiry(), UnixTime(650));
    }

    #[test]
    fn serialized_form_round_trips() {
        let record = record().with_scope(Some(Scope::from_static("read write")));

        let json = serde_json::to_string(&record).unwrap();
        let back: TokenRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(back, record);
        assert!(json.contains("\"expiry\":1100"));
    }
}
