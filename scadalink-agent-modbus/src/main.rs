//! Modbus/TCP field agent.
//!
//! Polls one controller and relays tag readings to the central API.

use scadalink_agent_framework::{HttpApiClient, run_agent};
use scadalink_agent_modbus::{ModbusAgentConfig, PollSettings, Scheduler, TcpTransport};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_agent::<ModbusAgentConfig, _, _>(
        "scadalink-agent-modbus",
        "scada-agent.json5",
        |config, shutdown| async move {
            let api = HttpApiClient::new(&config.api)?;
            let transport = TcpTransport::from_config(&config.plc);

            info!(
                controller = %config.plc.endpoint(),
                plc_id = config.plc.plc_id,
                api = %api.url(),
                "Agent configured"
            );

            let mut scheduler = Scheduler::new(transport, api, PollSettings::from_config(&config));
            scheduler.run(shutdown).await
        },
    )
    .await
}
