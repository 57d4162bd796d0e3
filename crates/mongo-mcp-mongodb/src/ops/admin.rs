//! Server administration and diagnostics

use bson::{doc, Bson, Document};
use mongo_mcp_common::{MongoMcpError, Result};
use mongodb::error::ErrorKind;
use serde_json::{json, Value};
use tracing::{error, info};

use super::{field, section, stat, Operations, SYSTEM_DATABASES};
use crate::validation::ValidatedDatabaseName;

/// Server error codes meaning "replication is not running here":
/// 76 `NoReplicationEnabled`, 94 `NotYetInitialized`
pub const REPLICATION_DISABLED_CODES: &[i32] = &[76, 94];

/// Outcome of a replica set status probe
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicaSetStatus {
    /// Raw `replSetGetStatus` reply
    Member(Document),
    NotAReplicaSet,
}

impl ReplicaSetStatus {
    /// Curated JSON; `null` when not part of a replica set
    pub fn to_json(&self) -> Value {
        match self {
            ReplicaSetStatus::NotAReplicaSet => Value::Null,
            ReplicaSetStatus::Member(status) => curate_replica_set(status),
        }
    }
}

/// Server command error code, if the error carries one
pub fn command_error_code(err: &mongodb::error::Error) -> Option<i32> {
    match *err.kind {
        ErrorKind::Command(ref command) => Some(command.code),
        _ => None,
    }
}

pub fn is_replication_disabled(code: i32) -> bool {
    REPLICATION_DISABLED_CODES.contains(&code)
}

impl Operations {
    pub async fn get_server_status(&self) -> Result<Value> {
        let client = self.client().await?;
        let status = self
            .call("get_server_status", "admin", None)
            .run(client.database("admin").run_command(doc! { "serverStatus": 1 }))
            .await?;

        let connections = section(&status, "connections");
        let network = section(&status, "network");
        let mem = section(&status, "mem");
        let extra = section(&status, "extra_info");

        info!("Retrieved server status");
        Ok(json!({
            "host": field(&status, "host"),
            "version": field(&status, "version"),
            "process": field(&status, "process"),
            "pid": field(&status, "pid"),
            "uptime": field(&status, "uptime"),
            "uptime_millis": field(&status, "uptimeMillis"),
            "local_time": field(&status, "localTime"),
            "connections": {
                "current": field(&connections, "current"),
                "available": field(&connections, "available"),
                "total_created": field(&connections, "totalCreated"),
            },
            "network": {
                "bytes_in": field(&network, "bytesIn"),
                "bytes_out": field(&network, "bytesOut"),
                "num_requests": field(&network, "numRequests"),
            },
            "opcounters": stat(&status, "opcounters", json!({})),
            "mem": {
                "bits": field(&mem, "bits"),
                "resident": field(&mem, "resident"),
                "virtual": field(&mem, "virtual"),
                "mapped": field(&mem, "mapped"),
            },
            "extra_info": {
                "note": field(&extra, "note"),
                "heap_usage_bytes": field(&extra, "heap_usage_bytes"),
                "page_faults": field(&extra, "page_faults"),
            },
        }))
    }

    /// Probe replica set membership.
    ///
    /// A deployment without a set name, or one whose status command fails with
    /// a replication-disabled code, is `NotAReplicaSet`; any other failure is
    /// an error.
    pub async fn replica_set_status(&self) -> Result<ReplicaSetStatus> {
        let client = self.client().await?;
        let admin = client.database("admin");
        let call = self.call("get_replica_set_status", "admin", None);

        let hello = call.run(admin.run_command(doc! { "hello": 1 })).await?;
        if hello.get_str("setName").is_err() {
            info!("MongoDB instance is not part of a replica set");
            return Ok(ReplicaSetStatus::NotAReplicaSet);
        }

        match call
            .run_raw(admin.run_command(doc! { "replSetGetStatus": 1 }))
            .await?
        {
            Ok(status) => Ok(ReplicaSetStatus::Member(status)),
            Err(e) if command_error_code(&e).is_some_and(is_replication_disabled) => {
                info!(error = %e, "Replication is not enabled");
                Ok(ReplicaSetStatus::NotAReplicaSet)
            }
            Err(e) => Err(call.fail(MongoMcpError::from(e))),
        }
    }

    pub async fn get_replica_set_status(&self) -> Result<Value> {
        Ok(self.replica_set_status().await?.to_json())
    }

    /// Ping the server, or one database. Failures are reported in the result.
    pub async fn ping_database(&self, database: Option<&str>) -> Result<Value> {
        let db = match database.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => Some(ValidatedDatabaseName::new(name)?),
            None => None,
        };

        match self.ping_inner(db.as_ref()).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(error = %e, "Failed to ping database");
                Ok(json!({
                    "ping_ok": false,
                    "connection_status": "failed",
                    "error": e.to_string(),
                    "database_info": if db.is_some() { json!({}) } else { Value::Null },
                }))
            }
        }
    }

    async fn ping_inner(&self, db: Option<&ValidatedDatabaseName>) -> Result<Value> {
        let client = self.client().await?;
        let target = db.map(|d| d.as_str()).unwrap_or("admin");
        let call = self.call("ping_database", target, None);

        let ping = call.run(client.database(target).run_command(doc! { "ping": 1 })).await?;

        let database_info = match db {
            Some(_) => {
                match call
                    .run(client.database(target).run_command(doc! { "dbStats": 1 }))
                    .await
                {
                    Ok(stats) => json!({
                        "database": field(&stats, "db"),
                        "collections": field(&stats, "collections"),
                        "objects": field(&stats, "objects"),
                        "data_size": field(&stats, "dataSize"),
                        "storage_size": field(&stats, "storageSize"),
                        "indexes": field(&stats, "indexes"),
                        "index_size": field(&stats, "indexSize"),
                    }),
                    Err(_) => json!({ "error": "Could not retrieve database stats" }),
                }
            }
            None => Value::Null,
        };

        let server_info = match call
            .run(client.database("admin").run_command(doc! { "hello": 1 }))
            .await
        {
            Ok(hello) => json!({
                "is_writable_primary": hello
                    .get("isWritablePrimary")
                    .or_else(|| hello.get("ismaster"))
                    .map(crate::sanitize::encode)
                    .unwrap_or(Value::Null),
                "max_bson_object_size": field(&hello, "maxBsonObjectSize"),
                "max_message_size_bytes": field(&hello, "maxMessageSizeBytes"),
                "max_write_batch_size": field(&hello, "maxWriteBatchSize"),
                "local_time": field(&hello, "localTime"),
                "min_wire_version": field(&hello, "minWireVersion"),
                "max_wire_version": field(&hello, "maxWireVersion"),
                "readonly": field(&hello, "readOnly"),
            }),
            Err(_) => json!({ "error": "Could not retrieve server info" }),
        };

        let mut report = json!({
            "ping_ok": ping_ok(&ping),
            "timestamp": field(&ping, "operationTime"),
            "server_info": server_info,
            "connection_status": "healthy",
        });
        if db.is_some() {
            report["database_info"] = database_info;
        }
        info!(database = target, "Ping succeeded");
        Ok(report)
    }

    /// End-to-end connection check. Failures are reported in the result.
    pub async fn test_connection(&self) -> Result<Value> {
        match self.test_connection_inner().await {
            Ok(report) => {
                info!("Connection test completed successfully");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Connection test failed");
                Ok(json!({
                    "connection_status": "failed",
                    "error": e.to_string(),
                    "ping_ok": false,
                }))
            }
        }
    }

    async fn test_connection_inner(&self) -> Result<Value> {
        let handle = self.resolver().get_handle().await?;
        let client = handle.client();
        let admin = client.database("admin");
        let call = self.call("test_connection", "admin", None);

        let ping = call.run(admin.run_command(doc! { "ping": 1 })).await?;
        let status = call.run(admin.run_command(doc! { "serverStatus": 1 })).await?;
        let names = call.run(client.list_database_names()).await?;
        let connections = section(&status, "connections");

        let (system, user): (Vec<String>, Vec<String>) = names
            .iter()
            .cloned()
            .partition(|n| SYSTEM_DATABASES.contains(&n.as_str()));

        let server_version = handle
            .topology()
            .server_version
            .clone()
            .map(Value::String)
            .unwrap_or_else(|| field(&status, "version"));

        Ok(json!({
            "connection_status": "healthy",
            "ping_ok": ping_ok(&ping),
            "server_version": server_version,
            "server_process": field(&status, "process"),
            "uptime_seconds": field(&status, "uptime"),
            "connections": {
                "current": field(&connections, "current"),
                "available": field(&connections, "available"),
                "total_created": field(&connections, "totalCreated"),
            },
            "databases": {
                "total_count": names.len(),
                "user_databases": user,
                "system_databases": system,
            },
        }))
    }

    /// Read-only snapshot of the resolver; never connects
    pub fn get_connection_details(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.resolver().describe())?)
    }
}

/// `ok` may come back as an int or a double
fn ping_ok(reply: &Document) -> bool {
    match reply.get("ok") {
        Some(Bson::Double(v)) => *v == 1.0,
        Some(Bson::Int32(v)) => *v == 1,
        Some(Bson::Int64(v)) => *v == 1,
        Some(Bson::Boolean(v)) => *v,
        _ => false,
    }
}

fn curate_replica_set(status: &Document) -> Value {
    let members: Vec<Value> = status
        .get_array("members")
        .map(|members| {
            members
                .iter()
                .filter_map(Bson::as_document)
                .map(curate_member)
                .collect()
        })
        .unwrap_or_default();

    json!({
        "set": field(status, "set"),
        "date": field(status, "date"),
        "my_state": field(status, "myState"),
        "term": field(status, "term"),
        "sync_source_host": field(status, "syncSourceHost"),
        "sync_source_id": field(status, "syncSourceId"),
        "heartbeat_interval_millis": field(status, "heartbeatIntervalMillis"),
        "majority_vote_count": field(status, "majorityVoteCount"),
        "write_majority_count": field(status, "writeMajorityCount"),
        "voting_members_count": field(status, "votingMembersCount"),
        "write_concern_majority_journal_default": field(status, "writeConcernMajorityJournalDefault"),
        "members": members,
    })
}

fn curate_member(member: &Document) -> Value {
    let optime = section(member, "optime");
    let durable = section(member, "optimeDurable");
    json!({
        "_id": field(member, "_id"),
        "name": field(member, "name"),
        "health": field(member, "health"),
        "state": field(member, "state"),
        "state_str": field(member, "stateStr"),
        "uptime": field(member, "uptime"),
        "optime": { "ts": field(&optime, "ts"), "t": field(&optime, "t") },
        "optime_durable": { "ts": field(&durable, "ts"), "t": field(&durable, "t") },
        "last_heartbeat": field(member, "lastHeartbeat"),
        "last_heartbeat_recv": field(member, "lastHeartbeatRecv"),
        "ping_ms": field(member, "pingMs"),
        "sync_source_host": field(member, "syncSourceHost"),
        "sync_source_id": field(member, "syncSourceId"),
        "info_message": field(member, "infoMessage"),
        "election_time": field(member, "electionTime"),
        "election_date": field(member, "electionDate"),
        "config_version": field(member, "configVersion"),
        "config_term": field(member, "configTerm"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Timestamp;

    #[test]
    fn test_replication_disabled_codes() {
        assert!(is_replication_disabled(76));
        assert!(is_replication_disabled(94));
        assert!(!is_replication_disabled(13));
    }

    #[test]
    fn test_not_a_replica_set_is_null() {
        assert_eq!(ReplicaSetStatus::NotAReplicaSet.to_json(), Value::Null);
    }

    #[test]
    fn test_curate_replica_set() {
        let status = doc! {
            "set": "rs0",
            "myState": 1,
            "members": [
                {
                    "_id": 0,
                    "name": "a:27017",
                    "health": 1.0,
                    "stateStr": "PRIMARY",
                    "optime": { "ts": Timestamp { time: 100, increment: 2 }, "t": 3i64 },
                },
                "garbage",
            ],
        };
        let curated = ReplicaSetStatus::Member(status).to_json();
        assert_eq!(curated["set"], json!("rs0"));
        assert_eq!(curated["my_state"], json!(1));
        let members = curated["members"].as_array().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0]["state_str"], json!("PRIMARY"));
        assert_eq!(members[0]["optime"]["ts"], json!("Timestamp(100, 2)"));
        assert_eq!(members[0]["sync_source_host"], Value::Null);
    }

    #[test]
    fn test_ping_ok() {
        assert!(ping_ok(&doc! { "ok": 1.0 }));
        assert!(ping_ok(&doc! { "ok": 1 }));
        assert!(!ping_ok(&doc! { "ok": 0.0 }));
        assert!(!ping_ok(&doc! {}));
    }
}
