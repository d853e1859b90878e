//! Greeting and LOGIN.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a session on a freshly opened stream by reading the greeting.
    ///
    /// A `BYE` greeting is [`Error::Bye`]; capabilities in an `OK` greeting
    /// are kept.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);

        let greeting = framed.read_response().await?;
        let code = match ResponseParser::parse(&greeting)? {
            Response::Untagged(
                UntaggedResponse::Ok { code, .. } | UntaggedResponse::PreAuth { code, .. },
            ) => code,
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => return Err(Error::Bye(text)),
            other => return Err(Error::Protocol(format!("greeting was {other:?}"))),
        };
        let capabilities = match code {
            Some(ResponseCode::Capability(caps)) => caps,
            _ => Vec::new(),
        };

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Logs in with a user name and (app) password.
    ///
    /// Gmail answers a wrong password with `NO [AUTHENTICATIONFAILED]`,
    /// which becomes [`Error::Auth`].
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        if self.has_capability(&Capability::LoginDisabled) {
            return Err(Error::InvalidState("LOGINDISABLED advertised".to_string()));
        }

        let tag = self.tag_gen.next();
        let cmd = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        }
        .serialize(&tag);
        self.stream.write_command(&cmd).await?;

        let responses = self.read_until_tagged(&tag).await?;
        self.absorb_capabilities(&responses);
        match Self::completion(&responses, &tag)? {
            (Status::Ok | Status::PreAuth, _) => {}
            (Status::No, text) => return Err(Error::Auth(text)),
            (Status::Bad, text) => return Err(Error::Bad(text)),
            (Status::Bye, text) => return Err(Error::Bye(text)),
        }
        Ok(self.into_state(Authenticated))
    }
}
