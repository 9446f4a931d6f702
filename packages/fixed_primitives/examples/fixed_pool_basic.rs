//! Basic usage of `FixedPool`: creating objects until the pool is full, destroying them and
//! reusing the freed slots.

use fixed_primitives::{DropPolicy, FixedPool};
use tracing::{info, warn};

#[derive(Debug)]
struct Connection {
    peer: &'static str,
    port: u16,
}

fn main() {
    tracing_subscriber::fmt().init();

    // Every connection must be closed explicitly before the pool goes away.
    let mut pool = FixedPool::<Connection, 3>::builder()
        .drop_policy(DropPolicy::MustNotDropItems)
        .build();

    let mut handles = Vec::new();

    for (peer, port) in [("alpha", 80), ("beta", 443), ("gamma", 8080), ("delta", 22)] {
        match pool.create(Connection { peer, port }) {
            Ok(handle) => {
                info!(peer, slot = handle.index(), "opened connection");
                handles.push(handle);
            }
            Err(rejected) => {
                let connection = rejected.into_inner();
                warn!(peer = connection.peer, "pool is full, connection refused");
            }
        }
    }

    info!(len = pool.len(), available = pool.available(), "pool state");

    // Close the oldest connection and let the freed slot be reused.
    let oldest = handles.remove(0);
    let freed_slot = oldest.index();
    let closed = pool.take(oldest);
    info!(peer = closed.peer, port = closed.port, "closed connection");

    let retried = pool
        .create_with(|| Connection {
            peer: "delta",
            port: 22,
        })
        .map_err(|_| "pool should have room after closing a connection");

    match retried {
        Ok(handle) => {
            assert_eq!(handle.index(), freed_slot);
            info!(slot = handle.index(), "reused freed slot");
            handles.push(handle);
        }
        Err(message) => warn!("{message}"),
    }

    for connection in pool.iter_mut() {
        connection.port = connection.port.saturating_add(1);
    }

    for connection in pool.iter() {
        info!(?connection, "live connection");
    }

    for handle in handles {
        pool.destroy(handle);
    }

    info!(is_empty = pool.is_empty(), "all connections closed");
}
