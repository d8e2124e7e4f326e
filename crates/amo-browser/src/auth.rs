//! Sign-in through the marketplace's login redirect chain
//!
//! Visiting the submit page without a session redirects through an
//! authorization gate to the OAuth sign-in form, which asks for the email,
//! then the password, then a one-time code. A successful code redirects back
//! to the submit page.

use crate::page::{wait_for_url, Page};
use crate::selectors::*;
use crate::totp;
use amo_core::{AmoError, Credentials, Result, Timeouts};
use tracing::{error, info};

/// Where the login chain currently is, judged from the page location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    /// On the submit page: signed in
    Authenticated,
    /// Intermediate gate that redirects on its own
    AuthorizationGate,
    /// OAuth sign-in form
    SignIn,
    /// The account has no 2FA and the site wants it set up
    TwoFactorSetup,
    /// Anywhere else
    Elsewhere,
}

/// Classify a page location relative to the submit URL
pub fn classify(url: &str, submit_url: &str) -> AuthStage {
    if url == submit_url {
        return AuthStage::Authenticated;
    }
    let path = path_of(url);
    if path == AUTHORIZATION_PATH {
        AuthStage::AuthorizationGate
    } else if path == TOTP_SETUP_PATH {
        AuthStage::TwoFactorSetup
    } else if is_signin_path(&path) {
        AuthStage::SignIn
    } else {
        AuthStage::Elsewhere
    }
}

/// Open the submit page, signing in first if the site asks for it.
///
/// On success the page is on `submit_url` exactly.
pub async fn authenticate<P>(
    page: &P,
    credentials: &Credentials,
    submit_url: &str,
    timeouts: &Timeouts,
) -> Result<()>
where
    P: Page + ?Sized,
{
    info!("Navigating to {}", submit_url);
    page.navigate(submit_url).await?;

    loop {
        let url = page.current_url().await?;
        match classify(&url, submit_url) {
            AuthStage::Authenticated => {
                info!("Already signed in");
                return Ok(());
            }
            AuthStage::AuthorizationGate => {
                info!("Waiting for redirection to signin page");
                leave_authorization_gate(page, timeouts).await?;
            }
            AuthStage::SignIn => break,
            AuthStage::TwoFactorSetup => {
                return Err(AmoError::TwoFactorNotConfigured {
                    email: credentials.email.clone(),
                })
            }
            AuthStage::Elsewhere => {
                return Err(AmoError::NavigationMismatch {
                    expected: submit_url.to_string(),
                    actual: url,
                })
            }
        }
    }

    info!("Redirected to signin page");
    submit_password(page, credentials, timeouts).await?;
    submit_one_time_code(page, credentials, submit_url, timeouts).await?;

    let url = page.current_url().await?;
    if url != submit_url {
        return Err(AmoError::NavigationMismatch {
            expected: submit_url.to_string(),
            actual: url,
        });
    }
    info!("Signin successful");
    Ok(())
}

async fn leave_authorization_gate<P: Page + ?Sized>(page: &P, timeouts: &Timeouts) -> Result<String> {
    wait_for_url(
        page,
        "redirect away from the authorization gate",
        timeouts.navigation(),
        |url| path_of(url) != AUTHORIZATION_PATH,
    )
    .await
}

/// Email and password steps, ending past the authorization gate
async fn submit_password<P: Page + ?Sized>(
    page: &P,
    credentials: &Credentials,
    timeouts: &Timeouts,
) -> Result<()> {
    page.wait_for_selector(EMAIL_INPUT, timeouts.navigation()).await?;
    info!("Entering email");
    page.set_value(EMAIL_INPUT, &credentials.email).await?;

    // The password step is rendered in place, there is no navigation to wait for
    info!("Continuing to password");
    page.click(SIGNIN_SUBMIT).await?;
    page.wait_for_selector(PASSWORD_INPUT, timeouts.navigation()).await?;
    page.set_value(PASSWORD_INPUT, &credentials.password).await?;

    info!("Submitting password");
    page.click_and_wait_for_navigation(SIGNIN_SUBMIT, timeouts.navigation())
        .await?;
    let url = leave_authorization_gate(page, timeouts).await?;

    if path_of(&url) == TOTP_SETUP_PATH {
        return Err(AmoError::TwoFactorNotConfigured {
            email: credentials.email.clone(),
        });
    }
    Ok(())
}

async fn submit_one_time_code<P: Page + ?Sized>(
    page: &P,
    credentials: &Credentials,
    submit_url: &str,
    timeouts: &Timeouts,
) -> Result<()> {
    page.wait_for_selector(TOTP_INPUT, timeouts.navigation()).await?;
    info!("Generating 2FA code");
    let code = totp::current_code(&credentials.totp_secret)?;
    info!("Entering 2FA code");
    page.set_value(TOTP_INPUT, &code).await?;
    info!("Submitting");
    page.click(TOTP_SUBMIT).await?;

    info!("Waiting for navigation to submit page...");
    let waited = wait_for_url(
        page,
        "redirect to the submit page after 2FA",
        timeouts.two_factor(),
        |url| url == submit_url,
    )
    .await;

    match waited {
        Ok(_) => Ok(()),
        Err(timeout @ AmoError::Timeout { .. }) => {
            error!("Current URL: {}", page.current_url().await?);
            match rejected_code_message(page).await? {
                Some(message) => Err(AmoError::TwoFactorVerification(message)),
                None => Err(timeout),
            }
        }
        Err(e) => Err(e),
    }
}

/// The site's message if it marked the code input invalid
async fn rejected_code_message<P: Page + ?Sized>(page: &P) -> Result<Option<String>> {
    if !page.exists(TOTP_INPUT).await? || !page.exists(TOTP_INPUT_INVALID).await? {
        return Ok(None);
    }

    let mut tooltip_id = None;
    for attribute in ["aria-describedby", "aria-described-by"] {
        tooltip_id = page.attribute(TOTP_INPUT, attribute).await?;
        if tooltip_id.is_some() {
            break;
        }
    }

    let message = match tooltip_id {
        Some(id) => page
            .text_content(&format!("#{}", id))
            .await?
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        None => None,
    };
    Ok(Some(
        message.unwrap_or_else(|| "the code was rejected".to_string()),
    ))
}
