//! Skeleton initiator: logs on, sends one order and logs out on the fill.

use async_trait::async_trait;
use fixline_core::error::FixError;
use fixline_core::field::FieldMap;
use fixline_core::message::{MsgType, MsgView};
use fixline_engine::{Application, SessionBuilder, SessionHandle};
use fixline_transport::TcpInitiator;
use std::time::Duration;
use tracing::{info, warn};

mod common;
use common::{ExampleConfig, init_logging};

#[derive(Debug)]
struct OrderEntry;

#[async_trait]
impl Application for OrderEntry {
    async fn on_application_msg(
        &mut self,
        session: &SessionHandle,
        msg_type: &MsgType,
        view: &MsgView<'_>,
    ) {
        if *msg_type == MsgType::ExecutionReport {
            info!(
                order_id = view.get_field_str(37).unwrap_or("-"),
                clid = view.get_field_str(11).unwrap_or("-"),
                "execution report"
            );
            if let Err(e) = session.done() {
                warn!(error = %e, "could not request logout");
            }
        }
    }

    fn on_encoded(&mut self, _msg_type: &MsgType, text: &str) {
        info!(">> {text}");
    }

    fn on_decoded(&mut self, _msg_type: &MsgType, text: &str) {
        info!("<< {text}");
    }

    async fn on_logon(
        &mut self,
        _view: &MsgView<'_>,
        _user: Option<&str>,
        _password: Option<&str>,
    ) -> bool {
        true
    }

    fn on_ready(&mut self, session: &SessionHandle, _view: &MsgView<'_>) {
        info!("Logon OK");
        let order = FieldMap::new()
            .with(11, "CL1")
            .with(55, "AAPL")
            .with(54, '1')
            .with(38, 100u64)
            .with(40, '1')
            .with(21, '1');
        if let Err(e) = session.send(MsgType::NewOrderSingle, order) {
            warn!(error = %e, "could not queue order");
        }
    }

    fn on_stopped(&mut self, error: Option<&FixError>) {
        if let Some(e) = error {
            warn!(error = %e, "session stopped with error");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cfg = ExampleConfig::client();
    info!("{} Client connecting to {}", cfg.begin_string, cfg.addr());

    let transport = TcpInitiator::new(cfg.addr(), cfg.transport()?)
        .connect(Duration::from_secs(10))
        .await?;
    let mut session = SessionBuilder::new(cfg.session()?)
        .with_application(OrderEntry)
        .build()?;

    let transport_id = session.run(transport).await?;
    info!(transport_id, "Session closed");
    Ok(())
}
