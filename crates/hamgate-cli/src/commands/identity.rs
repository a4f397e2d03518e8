//! Callsign enrolment and code commands

use std::path::Path;

use anyhow::{Context, Result};

use crate::output::{format_users, print_error, print_info, print_success, print_warning, UserEntry};
use hamgate_core::config::{GatewayConfig, IdentityFile};
use hamgate_core::time::current_time_secs;
use hamgate_core::Callsign;
use hamgate_server::auth::{
    build_generator, generate_secret, is_code_format, Authenticator, CODE_STEP_SECS,
};

fn load_authenticator(path: &Path) -> Result<Authenticator> {
    if !path.exists() {
        print_error(&format!("Identity store not found: {:?}", path));
        print_info("Run 'hamgate secret <CALLSIGN> --write' to enrol an operator");
        anyhow::bail!("no identity store");
    }
    Ok(Authenticator::load(path))
}

fn require_enrolled(auth: &Authenticator, callsign: &Callsign) -> Result<()> {
    if !auth.has_identity(callsign.as_str()) {
        print_error(&format!("{} is not enrolled", callsign));
        anyhow::bail!("unknown callsign {}", callsign);
    }
    Ok(())
}

/// Generate a secret, print it with its enrolment URI and optionally store it
pub fn secret_command(
    config: &GatewayConfig,
    callsign: &str,
    issuer: Option<&str>,
    write: bool,
) -> Result<()> {
    let callsign = Callsign::parse(callsign)?;
    let secret = generate_secret();

    let mut totp = build_generator(&callsign, &secret)?;
    if let Some(issuer) = issuer {
        totp.issuer = Some(issuer.to_string());
    }

    println!("{} = \"{}\"", callsign, secret);
    println!("{}", totp.get_url());

    if !write {
        print_info("Add the line above to the [users] table, or re-run with --write");
        return Ok(());
    }

    let path = &config.identities.path;
    let mut identities = if path.exists() {
        IdentityFile::load(path)
            .with_context(|| format!("Failed to read identity store {:?}", path))?
    } else {
        IdentityFile::default()
    };

    if identities.insert(&callsign, &secret).is_some() {
        print_warning(&format!("Replaced the existing secret for {}", callsign));
    }
    identities
        .save(path)
        .with_context(|| format!("Failed to write identity store {:?}", path))?;

    print_success(&format!("Enrolled {} in {:?}", callsign, path));
    print_info("Send SIGHUP to a running gateway to pick up the change");
    Ok(())
}

/// Print the code currently valid for a callsign
pub fn code_command(config: &GatewayConfig, callsign: &str) -> Result<()> {
    let auth = load_authenticator(&config.identities.path)?;
    let callsign = Callsign::normalize(callsign);
    require_enrolled(&auth, &callsign)?;

    let Some(code) = auth.current_code(callsign.as_str()) else {
        anyhow::bail!("no code for {}", callsign);
    };
    println!("{}", code);
    print_info(&format!(
        "Valid for {}s",
        CODE_STEP_SECS - current_time_secs() % CODE_STEP_SECS
    ));
    Ok(())
}

/// Check a code against the stored secret
///
/// Uses the same drift tolerance as the gateway but none of its rate limit
/// or replay state.
pub fn verify_command(config: &GatewayConfig, callsign: &str, code: &str) -> Result<()> {
    if !is_code_format(code) {
        print_error("Invalid code format (must be 6 digits)");
        anyhow::bail!("malformed code");
    }

    let auth = load_authenticator(&config.identities.path)?;
    let callsign = Callsign::normalize(callsign);
    require_enrolled(&auth, &callsign)?;

    if auth.matches_current_code(callsign.as_str(), code) {
        print_success(&format!("Code is valid for {}", callsign));
        Ok(())
    } else {
        print_error(&format!("Code is not valid for {}", callsign));
        anyhow::bail!("code rejected");
    }
}

/// List enrolled callsigns
pub fn users_command(config: &GatewayConfig) -> Result<()> {
    let path = &config.identities.path;
    if !path.exists() {
        print_warning(&format!("No identity store at {:?}", path));
        return Ok(());
    }

    let identities = IdentityFile::load(path)
        .with_context(|| format!("Failed to read identity store {:?}", path))?;

    let users: Vec<UserEntry> = identities
        .users
        .iter()
        .map(|(callsign, secret)| UserEntry {
            callsign: callsign.clone(),
            secret: secret.clone(),
            valid: build_generator(&Callsign::normalize(callsign), secret).is_ok(),
        })
        .collect();

    println!("Enrolled callsigns ({:?}):", path);
    println!("{}", format_users(&users));
    Ok(())
}
