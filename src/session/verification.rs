use std::net::SocketAddr;

use log::{info, warn};

use super::{Handler, Menu, Reply, Unauthenticated};
use crate::auth::Identity;
use crate::email::generate_code;
use crate::errors::{ServerError, ServerResult};
use crate::protocol::{
    parse_payload, Request, RequestKind, ResendVerificationCodeResponse, ResponseKind,
    SubmitVerificationCodeRequest, SubmitVerificationCodeResponse,
};
use crate::Context;

const MAX_TRIES: u32 = 5;

/// A freshly signed-up user who still has to echo back the emailed code.
/// Giving up (or running out of tries) scrubs the unverified account.
pub struct AwaitingVerification {
    user: Identity,
    email: String,
    code: String,
    tries: u32,
}

impl AwaitingVerification {
    pub fn new(user: Identity, email: String, code: String) -> Self {
        Self {
            user,
            email,
            code,
            tries: 0,
        }
    }

    pub async fn handle(
        &mut self,
        context: &Context,
        request: &Request,
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        match request.kind {
            RequestKind::SubmitVerificationCode => {
                self.submit_code(context, &request.payload, peer).await
            }
            RequestKind::ResendVerificationCode => self.resend_code(context, peer).await,
            RequestKind::Disconnect => {
                // The signup never completed, so the account goes away
                context.auth.scrub_unverified(&self.user.username).await;
                Ok(Reply::empty())
            }
            _ => Err(ServerError::Unauthorized),
        }
    }

    async fn submit_code(
        &mut self,
        context: &Context,
        payload: &[u8],
        peer: SocketAddr,
    ) -> ServerResult<Reply> {
        let request: SubmitVerificationCodeRequest = parse_payload(payload)?;

        self.tries += 1;

        if request.code == self.code {
            info!(
                "User '{}' submitted correct verification code, logging him in ({})",
                self.user.username, peer
            );

            return Reply::with_next(
                ResponseKind::SubmitVerificationCode,
                &SubmitVerificationCodeResponse {
                    status: true,
                    is_verified: true,
                },
                Handler::Menu(Menu::new(self.user.clone())),
            );
        }

        if self.tries >= MAX_TRIES {
            info!(
                "User '{}' ran out of verification tries, transferring him to login ({})",
                self.user.username, peer
            );

            context.auth.scrub_unverified(&self.user.username).await;

            return Reply::with_next(
                ResponseKind::SubmitVerificationCode,
                &SubmitVerificationCodeResponse {
                    status: false,
                    is_verified: false,
                },
                Handler::Unauthenticated(Unauthenticated),
            );
        }

        info!(
            "User '{}' submitted incorrect verification code ({})",
            self.user.username, peer
        );

        Reply::new(
            ResponseKind::SubmitVerificationCode,
            &SubmitVerificationCodeResponse {
                status: true,
                is_verified: false,
            },
        )
    }

    async fn resend_code(&mut self, context: &Context, peer: SocketAddr) -> ServerResult<Reply> {
        let code = generate_code();

        let sent = context
            .mailer
            .send_verification(&self.email, &code, &self.user.username)
            .await;

        if let Err(e) = sent {
            warn!(
                "Failed to resend verification code to user '{}' ({}) ({})",
                self.user.username, e, peer
            );

            return Reply::new(
                ResponseKind::ResendVerificationCode,
                &ResendVerificationCodeResponse { status: false },
            );
        }

        info!(
            "User '{}' requested to resend verification code ({})",
            self.user.username, peer
        );

        self.code = code;

        Reply::new(
            ResponseKind::ResendVerificationCode,
            &ResendVerificationCodeResponse { status: true },
        )
    }
}
