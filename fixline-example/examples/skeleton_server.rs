//! Skeleton acceptor: answers every NewOrderSingle with an ExecutionReport.

use async_trait::async_trait;
use fixline_core::error::FixError;
use fixline_core::field::FieldMap;
use fixline_core::message::{MsgType, MsgView};
use fixline_engine::{Application, SessionBuilder, SessionHandle};
use fixline_transport::TcpAcceptor;
use tracing::{error, info, warn};

mod common;
use common::{ExampleConfig, init_logging};

#[derive(Debug, Default)]
struct OrderDesk {
    next_order_id: u64,
}

#[async_trait]
impl Application for OrderDesk {
    async fn on_application_msg(
        &mut self,
        session: &SessionHandle,
        msg_type: &MsgType,
        view: &MsgView<'_>,
    ) {
        if *msg_type != MsgType::NewOrderSingle {
            warn!(%msg_type, "unhandled message");
            return;
        }
        self.next_order_id += 1;
        let clid = view.get_field_str(11).unwrap_or("0");
        let qty = view.get_field_str(38).unwrap_or("0");
        let report = FieldMap::new()
            .with(37, format!("ORD{}", self.next_order_id))
            .with(11, clid)
            .with(17, format!("EX{}", self.next_order_id))
            .with(150, '0')
            .with(39, '0')
            .with(55, view.get_field_str(55).unwrap_or("N/A"))
            .with(54, view.get_field_str(54).unwrap_or("1"))
            .with(151, qty)
            .with(14, 0u64)
            .with(6, 0u64);
        if let Err(e) = session.send(MsgType::ExecutionReport, report) {
            warn!(error = %e, "could not queue execution report");
        }
    }

    fn on_decoded(&mut self, _msg_type: &MsgType, text: &str) {
        info!("<< {text}");
    }

    fn on_encoded(&mut self, _msg_type: &MsgType, text: &str) {
        info!(">> {text}");
    }

    async fn on_logon(
        &mut self,
        _view: &MsgView<'_>,
        user: Option<&str>,
        _password: Option<&str>,
    ) -> bool {
        info!(user = user.unwrap_or("-"), "logon request");
        true
    }

    fn on_ready(&mut self, _session: &SessionHandle, _view: &MsgView<'_>) {
        info!("client logged in");
    }

    fn on_stopped(&mut self, error: Option<&FixError>) {
        match error {
            Some(e) => warn!(error = %e, "session stopped with error"),
            None => info!("session stopped"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cfg = ExampleConfig::server();
    let acceptor = TcpAcceptor::bind(cfg.addr(), cfg.transport()?).await?;
    info!("Starting {} server on {}", cfg.begin_string, acceptor.local_addr()?);

    loop {
        let (transport, peer) = acceptor.accept().await?;
        info!("Connection from {}", peer);
        let mut session = SessionBuilder::new(cfg.session()?)
            .with_application(OrderDesk::default())
            .build()?;
        tokio::spawn(async move {
            if let Err(e) = session.run(transport).await {
                error!("Error: {}", e);
            }
        });
    }
}
