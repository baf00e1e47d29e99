#![forbid(unsafe_code)]

use super::{Message, MessageCodec, RequestKind};
use crate::error::Error;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

/// One connection to a [`super::QueryService`].
#[derive(Debug)]
pub struct QueryClient {
    framed: Framed<TcpStream, MessageCodec>,
}

impl QueryClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: Framed::new(stream, MessageCodec::new()),
        })
    }

    pub fn peer_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.framed.get_ref().peer_addr()?)
    }

    /// Send an arbitrary message and wait for its reply.
    pub async fn send(&mut self, message: Message) -> Result<Message, Error> {
        self.framed.send(message).await?;
        match self.framed.next().await {
            Some(reply) => Ok(reply?),
            None => Err(Error::SessionClosed),
        }
    }

    pub async fn request(&mut self, kind: RequestKind) -> Result<Message, Error> {
        self.send(Message::request(kind)).await
    }
}
