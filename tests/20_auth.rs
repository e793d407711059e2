// Token verification and internal identity signing, through the same
// configuration the gateway runs with.

use chrono::Utc;

use atrium_gateway::auth::{issue_token, InternalSigner, TokenVerifier};
use atrium_gateway::tenancy::{TenancyError, TenantContext};

#[test]
fn issued_tokens_verify_and_carry_claims() {
    let verifier = TokenVerifier::from_config().unwrap();
    let token = issue_token("acme_1", "user-42", vec!["member".to_string()]).unwrap();

    let claims = verifier.verify(&token).unwrap();
    assert_eq!(claims.tenant_id, "acme_1");
    assert_eq!(claims.subject_id, "user-42");
    assert!(claims.has_role("member"));
    assert!(claims.expires_at > Utc::now());
}

#[test]
fn tampered_tokens_are_rejected() {
    let verifier = TokenVerifier::from_config().unwrap();
    let token = issue_token("acme_1", "user-42", vec![]).unwrap();

    // Flip a character in the signature segment.
    let mut tampered = token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'a' { 'b' } else { 'a' });

    assert!(matches!(
        verifier.verify(&tampered),
        Err(TenancyError::InvalidToken(_))
    ));
}

#[test]
fn structurally_invalid_tokens_are_rejected() {
    let verifier = TokenVerifier::from_config().unwrap();

    for garbage in ["", "abc", "a.b", "a.b.c.d", "....."] {
        assert!(
            verifier.verify(garbage).is_err(),
            "token {:?} should not verify",
            garbage
        );
    }
}

#[test]
fn internal_identity_round_trips_the_full_context() {
    let signer = InternalSigner::from_config().unwrap();
    let ctx = TenantContext::from_parts("acme_1", "t_acme_1", "user-42", Utc::now());

    let token = signer.sign(&ctx).unwrap();
    let restored = signer.verify(&token).unwrap();

    assert_eq!(restored.tenant_id, ctx.tenant_id);
    assert_eq!(restored.schema_name, ctx.schema_name);
    assert_eq!(restored.subject_id, ctx.subject_id);
}

#[test]
fn external_tokens_do_not_pass_as_internal_identity() {
    // A bearer token signed with the external secret must not verify
    // against the internal trust boundary.
    let signer = InternalSigner::from_config().unwrap();
    let external = issue_token("acme_1", "user-42", vec![]).unwrap();

    assert!(signer.verify(&external).is_err());
}
