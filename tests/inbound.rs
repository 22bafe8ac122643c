mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::sync::oneshot;
use tokio::time::Instant;

use common::{config, linux_host, FakeAgent, FakeConnector, MemorySink, SYS_NAME};
use snmp_gateway::collector::Scheduler;
use snmp_gateway::error::GatewayError;
use snmp_gateway::gateway::{Gateway, InboundQueue, INBOUND_CAPACITY};
use snmp_gateway::handlers::inbound::{handle_attribute_update, handle_rpc};
use snmp_gateway::models::{AttributeUpdate, RpcData, RpcParams, RpcReply, RpcRequest};
use snmp_gateway::snmp::SnmpValue;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const INVENTORY: &str = r#"
devices:
  - deviceName: core
    ip: 10.0.0.1
    attributeUpdateRequests:
      - attributeFilter: "^hostname$"
        method: set
        oid: "1.3.6.1.2.1.1.5.0"
    serverSideRpcRequests:
      - requestFilter: "^get(Descr|Name)$"
        key: descr
        method: get
        oid: "1.3.6.1.2.1.1.1.0"
      - requestFilter: "^get$"
        key: shadowed
        method: getnext
        oid: "1.3.6.1.2.1.1.1"
      - requestFilter: "^slow$"
        key: name
        method: get
        oid: "1.3.6.1.2.1.1.5.0"
        timeout: 1
"#;

fn setup(agent: FakeAgent) -> (Scheduler, Arc<MemorySink>) {
    let connector = Arc::new(FakeConnector::new().with_agent("10.0.0.1:161", agent));
    let sink = Arc::new(MemorySink::new());
    let scheduler = Scheduler::new(&config(INVENTORY), connector, sink.clone());
    (scheduler, sink)
}

fn request(device: &str, method: &str, params: RpcParams) -> RpcRequest {
    RpcRequest {
        device: device.to_string(),
        data: RpcData {
            id: json!(7),
            method: method.to_string(),
            params,
            timeout: None,
        },
    }
}

fn result_of(reply: &RpcReply) -> Value {
    match reply {
        RpcReply::Success { result } => serde_json::from_str(result).unwrap(),
        RpcReply::Failure { error, .. } => panic!("RPC завершился ошибкой: {}", error),
    }
}

fn error_of(reply: &RpcReply) -> &str {
    match reply {
        RpcReply::Failure { error, success } => {
            assert!(!success);
            error
        }
        RpcReply::Success { result } => panic!("ожидалась ошибка, получено {}", result),
    }
}

#[tokio::test]
async fn reserved_get_reads_requested_oid() {
    let (mut scheduler, _) = setup(linux_host());

    let reply = handle_rpc(
        &mut scheduler,
        &request("core", "get", RpcParams::Text(format!("oid={}", SYS_NAME))),
        DEFAULT_TIMEOUT,
        0,
    )
    .await;

    assert_eq!(result_of(&reply), json!({"1.3.6.1.2.1.1.5.0": "core"}));
}

#[tokio::test]
async fn reserved_get_shadows_configured_rpc() {
    let (mut scheduler, _) = setup(linux_host());

    let mut params = Map::new();
    params.insert("oid".to_string(), json!(SYS_NAME));
    params.insert("key".to_string(), json!("hostname"));
    let reply = handle_rpc(
        &mut scheduler,
        &request("core", "get", RpcParams::Structured(params)),
        DEFAULT_TIMEOUT,
        0,
    )
    .await;

    assert_eq!(result_of(&reply), json!({"hostname": "core"}));
}

#[tokio::test]
async fn configured_rpc_is_matched_by_regex() {
    let (mut scheduler, _) = setup(linux_host());

    let reply = handle_rpc(&mut scheduler, &request("core", "getName", RpcParams::default()), DEFAULT_TIMEOUT, 0).await;

    assert_eq!(result_of(&reply), json!({"descr": "Linux core 6.1"}));
}

#[tokio::test]
async fn unknown_targets_fail() {
    let (mut scheduler, _) = setup(linux_host());

    let no_device = handle_rpc(&mut scheduler, &request("edge", "get", RpcParams::default()), DEFAULT_TIMEOUT, 0).await;
    assert!(error_of(&no_device).contains("edge"));

    let no_method = handle_rpc(&mut scheduler, &request("core", "reboot", RpcParams::default()), DEFAULT_TIMEOUT, 0).await;
    assert!(error_of(&no_method).contains("reboot"));

    // get без OID
    let no_oid = handle_rpc(&mut scheduler, &request("core", "get", RpcParams::default()), DEFAULT_TIMEOUT, 0).await;
    assert!(!no_oid.is_success());
}

#[tokio::test]
async fn unreachable_device_fails_the_rpc() {
    let agent = linux_host();
    agent.set_down(true);
    let (mut scheduler, _) = setup(agent);

    let reply = handle_rpc(&mut scheduler, &request("core", "getDescr", RpcParams::default()), DEFAULT_TIMEOUT, 0).await;

    assert!(error_of(&reply).contains("10.0.0.1:161"));
}

#[tokio::test(start_paused = true)]
async fn slow_agent_hits_item_timeout() {
    let agent = linux_host();
    agent.set_delay(Duration::from_secs(2));
    let (mut scheduler, sink) = setup(agent);

    let reply = handle_rpc(&mut scheduler, &request("core", "slow", RpcParams::default()), DEFAULT_TIMEOUT, 0).await;

    assert!(error_of(&reply).contains("Превышено время ожидания"));
    // подключение прервано вместе с запросом
    assert!(sink.of_kind("connect").is_empty());
}

#[tokio::test(start_paused = true)]
async fn request_timeout_overrides_item_timeout() {
    let agent = linux_host();
    agent.set_delay(Duration::from_secs(2));
    let (mut scheduler, _) = setup(agent);

    let mut slow = request("core", "slow", RpcParams::default());
    slow.data.timeout = Some(10_000);

    let reply = handle_rpc(&mut scheduler, &slow, DEFAULT_TIMEOUT, 0).await;

    assert_eq!(result_of(&reply), json!({"name": "core"}));
}

#[tokio::test]
async fn attribute_update_runs_matching_requests() {
    let agent = linux_host();
    let (mut scheduler, _) = setup(agent.clone());

    let mut data = Map::new();
    data.insert("hostname".to_string(), json!("edge-1"));
    data.insert("location".to_string(), json!("rack 4"));
    let update = AttributeUpdate {
        device: "core".to_string(),
        data,
    };

    let executed = handle_attribute_update(&mut scheduler, &update, DEFAULT_TIMEOUT, 0)
        .await
        .unwrap();

    assert_eq!(executed, 1);
    assert_eq!(agent.value(SYS_NAME), Some(SnmpValue::OctetString(b"edge-1".to_vec())));

    let unknown = AttributeUpdate {
        device: "edge".to_string(),
        data: Map::new(),
    };
    assert!(handle_attribute_update(&mut scheduler, &unknown, DEFAULT_TIMEOUT, 0).await.is_err());
}

#[tokio::test]
async fn gateway_serves_queue_in_order() {
    let agent = linux_host();
    let (scheduler, sink) = setup(agent);

    let (queue, inbound) = InboundQueue::channel(INBOUND_CAPACITY, DEFAULT_TIMEOUT);
    let gateway = Gateway::new(scheduler, inbound, Duration::from_secs(3600), DEFAULT_TIMEOUT);
    let (stop, stopped) = oneshot::channel::<()>();

    let client = async {
        let mut data = Map::new();
        data.insert("hostname".to_string(), json!("edge-1"));
        queue
            .attributes(AttributeUpdate {
                device: "core".to_string(),
                data,
            })
            .await
            .unwrap();

        // очередь одна: RPC увидит уже записанное имя
        let reply = queue
            .rpc(request("core", "get", RpcParams::Text(format!("oid={};key=name", SYS_NAME))))
            .await
            .unwrap();

        let _ = stop.send(());
        reply
    };

    let run = gateway.run(async move {
        let _ = stopped.await;
    });

    let ((), reply) = tokio::join!(run, client);

    assert_eq!(result_of(&reply), json!({"name": "edge-1"}));

    let replies = sink.of_kind("rpc_reply");
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].data["id"], json!(7));
    assert_eq!(replies[0].data["payload"]["result"], json!(r#"{"name":"edge-1"}"#));

    assert_eq!(sink.kinds_for("core")[..2], ["disconnect", "connect"]);
}

#[tokio::test(start_paused = true)]
async fn rpc_is_served_between_poll_steps() {
    let yaml = r#"
gateway:
  pollPeriod: 1000
devices:
  - deviceName: slow
    ip: 10.0.0.2
    telemetry:
      - {key: a, method: get, oid: "1.3.6.1.2.1.1.5.0"}
      - {key: b, method: get, oid: "1.3.6.1.2.1.1.1.0"}
      - {key: c, method: get, oid: "1.3.6.1.2.1.1.3.0"}
      - {key: d, method: get, oid: "1.3.6.1.2.1.1.2.0"}
  - deviceName: core
    ip: 10.0.0.1
"#;
    let slow = linux_host();
    slow.set_delay(Duration::from_secs(4));
    let connector = Arc::new(
        FakeConnector::new()
            .with_agent("10.0.0.2:161", slow)
            .with_agent("10.0.0.1:161", linux_host()),
    );
    let sink = Arc::new(MemorySink::new());
    let scheduler = Scheduler::new(&config(yaml), connector, sink);

    let (queue, inbound) = InboundQueue::channel(INBOUND_CAPACITY, DEFAULT_TIMEOUT);
    let gateway = Gateway::new(scheduler, inbound, Duration::from_secs(1), DEFAULT_TIMEOUT);
    let (stop, stopped) = oneshot::channel::<()>();

    let client = async {
        // опрос slow занимает 16 с на цикл
        tokio::time::sleep(Duration::from_secs(6)).await;

        let sent = Instant::now();
        let reply = queue
            .rpc(request("core", "get", RpcParams::Text(format!("oid={}", SYS_NAME))))
            .await;
        let waited = sent.elapsed();

        let _ = stop.send(());
        (reply, waited)
    };

    let run = gateway.run(async move {
        let _ = stopped.await;
    });

    let ((), (reply, waited)) = tokio::join!(run, client);

    assert_eq!(result_of(&reply.unwrap()), json!({"1.3.6.1.2.1.1.5.0": "core"}));
    // не дольше одного шага опроса
    assert!(waited <= Duration::from_secs(4), "ожидание {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn caller_wait_starts_at_enqueue() {
    let (queue, _inbound) = InboundQueue::channel(INBOUND_CAPACITY, DEFAULT_TIMEOUT);

    let started = Instant::now();
    let result = queue.rpc(request("core", "getName", RpcParams::default())).await;
    assert!(matches!(result, Err(GatewayError::Timeout(limit)) if limit == DEFAULT_TIMEOUT));
    assert!(started.elapsed() < DEFAULT_TIMEOUT + Duration::from_secs(1));

    let mut short = request("core", "getName", RpcParams::default());
    short.data.timeout = Some(1_000);
    let result = queue.rpc(short).await;
    assert!(matches!(result, Err(GatewayError::Timeout(limit)) if limit == Duration::from_secs(1)));
}

#[tokio::test(start_paused = true)]
async fn expired_rpc_is_not_sent_to_device() {
    let (scheduler, sink) = setup(linux_host());
    let (queue, inbound) = InboundQueue::channel(INBOUND_CAPACITY, Duration::from_secs(1));

    // шлюз еще не читает очередь
    let expired = queue
        .rpc(request("core", "get", RpcParams::Text(format!("oid={}", SYS_NAME))))
        .await;
    assert!(matches!(expired, Err(GatewayError::Timeout(_))));

    let gateway = Gateway::new(scheduler, inbound, Duration::from_secs(3600), DEFAULT_TIMEOUT);
    gateway.run(tokio::time::sleep(Duration::from_secs(10))).await;

    // ответ отправлен до подключения к устройству
    assert_eq!(sink.kinds_for("core"), vec!["rpc_reply", "disconnect", "connect"]);
    let reply = &sink.of_kind("rpc_reply")[0];
    assert_eq!(reply.data["payload"]["success"], json!(false));
    assert!(reply.data["payload"]["error"]
        .as_str()
        .unwrap()
        .contains("Превышено время ожидания"));
}
