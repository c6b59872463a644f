use std::net::SocketAddr;

/// Bind a listener with `SO_REUSEADDR`, so a restarted server does not fail
/// on a socket still in `TIME_WAIT`.
pub fn bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener, String> {
    use socket2::{Domain, Socket, Type};

    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::STREAM, None)
        .map_err(|err| format!("socket create failed: {}", err))?;
    socket
        .set_reuse_address(true)
        .map_err(|err| format!("set_reuse_address failed: {}", err))?;
    socket
        .bind(&addr.into())
        .map_err(|err| format!("bind {} failed: {}", addr, err))?;
    socket
        .listen(1024)
        .map_err(|err| format!("listen failed: {}", err))?;
    let listener: std::net::TcpListener = socket.into();
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;
    tokio::net::TcpListener::from_std(listener)
        .map_err(|err| format!("tokio listener failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_an_ephemeral_port() {
        let listener = bind_listener("127.0.0.1:0".parse().expect("addr")).expect("bind");
        assert_ne!(listener.local_addr().expect("local addr").port(), 0);
    }
}
