use std::net::SocketAddr;

use log::{info, warn};

use super::{AwaitingVerification, Handler, Menu, Reply};
use crate::email::generate_code;
use crate::errors::{ServerError, ServerResult};
use crate::protocol::{
    parse_payload, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse,
    Request, RequestKind, ResponseKind, SignupRequest, SignupResponse,
};
use crate::store::StorageError;
use crate::Context;

/// The phase every connection starts in: nobody is logged in yet.
pub struct Unauthenticated;

impl Unauthenticated {
    pub async fn handle(
        &mut self,
        context: &Context,
        request: &Request,
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        match request.kind {
            RequestKind::Login => self.login(context, &request.payload, peer).await,
            RequestKind::Signup => self.signup(context, &request.payload, peer).await,
            RequestKind::ForgotPassword => {
                self.forgot_password(context, &request.payload, peer).await
            }
            // Nothing to clean up before authentication
            RequestKind::Disconnect => Ok(Reply::empty()),
            _ => Err(ServerError::Unauthorized),
        }
    }

    async fn login(
        &self,
        context: &Context,
        payload: &[u8],
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        let request: LoginRequest = parse_payload(payload)?;

        match context.auth.login(&request.username, &request.password).await {
            Ok(identity) => {
                info!("User '{}' logged in ({})", identity.username, peer);

                Reply::with_next(
                    ResponseKind::Login,
                    &LoginResponse {
                        status: true,
                        message: String::new(),
                    },
                    Handler::Menu(Menu::new(identity)),
                )
            }
            Err(ServerError::InvalidCredentials(message)) => {
                warn!("User failed to log in ({}) ({})", message, peer);

                Reply::new(
                    ResponseKind::Login,
                    &LoginResponse {
                        status: false,
                        message,
                    },
                )
            }
            Err(e) => Err(e),
        }
    }

    async fn signup(
        &self,
        context: &Context,
        payload: &[u8],
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        let request: SignupRequest = parse_payload(payload)?;
        let email = request.email.clone();

        let identity = match context.auth.signup(request).await {
            Ok(identity) => identity,
            Err(ServerError::InvalidCredentials(message)) => {
                warn!("User failed to sign up ({}) ({})", message, peer);

                return Reply::new(
                    ResponseKind::Signup,
                    &SignupResponse {
                        status: false,
                        message,
                    },
                );
            }
            Err(e @ ServerError::AlreadyExists(_)) => {
                warn!("User failed to sign up ({}) ({})", e, peer);

                return Reply::new(
                    ResponseKind::Signup,
                    &SignupResponse {
                        status: false,
                        message: e.to_string(),
                    },
                );
            }
            Err(e) => return Err(e),
        };

        info!(
            "User '{}' started signup process, sending verification email... ({})",
            identity.username, peer
        );

        let code = generate_code();

        // No email means no way to verify, so the half-made account goes away
        if let Err(e) = context
            .mailer
            .send_verification(&email, &code, &identity.username)
            .await
        {
            context.auth.scrub_unverified(&identity.username).await;
            return Err(ServerError::ExternalService(e.to_string()));
        }

        info!("Email sent successfully to user '{}'", identity.username);

        Reply::with_next(
            ResponseKind::Signup,
            &SignupResponse {
                status: true,
                message: String::new(),
            },
            Handler::AwaitingVerification(AwaitingVerification::new(identity, email, code)),
        )
    }

    async fn forgot_password(
        &self,
        context: &Context,
        payload: &[u8],
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        let request: ForgotPasswordRequest = parse_payload(payload)?;

        let status = match context
            .storage
            .password_for_recovery_email(&request.email)
            .await
        {
            Ok(secret) => {
                let sent = context
                    .mailer
                    .send_password_recovery(&request.email, &secret)
                    .await;

                match sent {
                    Ok(()) => {
                        info!(
                            "Password recovery email sent to '{}' ({})",
                            request.email, peer
                        );
                        true
                    }
                    Err(e) => {
                        warn!("Failed to send recovery email ({}) ({})", e, peer);
                        false
                    }
                }
            }
            Err(StorageError::NotFound { .. }) => {
                warn!(
                    "User tried to recover email that does not exist: '{}' ({})",
                    request.email, peer
                );
                false
            }
            Err(e) => return Err(e.into()),
        };

        Reply::new(ResponseKind::ForgotPassword, &ForgotPasswordResponse { status })
    }
}
