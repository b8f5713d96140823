//! Round Trip Example
//!
//! Writes a batch through the client, walks every shard back from the trim
//! horizon, then splits a shard and shows the parent reaching its end.
//! Runs entirely against the in-memory stream service.
//!
//! Run with:
//! ```bash
//! cargo run --package shardlog-client --example round_trip
//! ```

use shardlog_client::{InMemoryStreamService, PutFault, RecordEntry, StreamClient};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("\nShardlog Round Trip Example");
    println!("===========================\n");

    // Step 1: Stream with three shards, listed two per page
    let service = Arc::new(InMemoryStreamService::with_page_size(2));
    service.create_stream("orders", 3).await?;
    println!("Step 1: created stream 'orders' with 3 shards\n");

    let client = StreamClient::builder()
        .service(service.clone())
        .stream_name("orders")
        .read_limit(4)
        .max_retries(5)
        .build()?;

    // Step 2: Write, with the service rejecting two entries on the first round
    service.inject_put_fault(PutFault::Reject(vec![1, 6])).await;
    let batch: Vec<RecordEntry> = (0..12)
        .map(|i| {
            RecordEntry::new(
                format!("user{}", i % 5),
                format!("{{\"order_id\": {}, \"amount\": {}}}", i, i * 100),
            )
        })
        .collect();
    let summary = client.write(batch).await?;
    println!(
        "Step 2: wrote {} records in {} attempts\n",
        summary.records, summary.attempts
    );

    // Step 3: Read every shard back
    println!("Step 3: reading shards");
    for shard in client.list_shards().await? {
        let mut cursor = Some(client.resolve_iterator(&shard.shard_id, None).await?);
        let mut total = 0;
        while let Some(current) = cursor {
            let batch = client.read(&current).await?;
            if batch.records.is_empty() {
                break;
            }
            for record in &batch.records {
                println!(
                    "   {} seq={} key={} data={}",
                    shard.shard_id,
                    record.sequence_number,
                    record.partition_key,
                    String::from_utf8_lossy(&record.data)
                );
            }
            total += batch.records.len();
            cursor = batch.next_cursor;
        }
        println!("   {}: {} records\n", shard.shard_id, total);
    }

    // Step 4: Split the first shard; its reader now reaches the end
    let parent = client.list_shards().await?[0].shard_id.clone();
    let (left, right) = service.split_shard("orders", &parent).await?;
    println!("Step 4: split {} into {} and {}", parent, left, right);

    let mut cursor = Some(client.resolve_iterator(&parent, None).await?);
    while let Some(current) = cursor {
        let batch = client.read(&current).await?;
        if batch.is_end_of_shard() {
            println!("   {} fully consumed and closed\n", parent);
        }
        cursor = batch.next_cursor;
    }

    client.close().await?;
    println!("Done.");
    Ok(())
}
