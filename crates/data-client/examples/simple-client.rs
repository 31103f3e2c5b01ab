use cx_data_client::reqwest::ReqwestDataClient;
use cx_data_client::DataClient;
use cx_primitives::Block;


#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args().nth(1).unwrap_or("http://127.0.0.1:8545".to_string());
    let client = ReqwestDataClient::from_url(url.as_str())?.with_max_retries(3);

    let tip = client.current_height().await?;
    println!("tip: {}", tip);

    let block = client.fetch(tip).await?;
    println!("block: {} hash: {} parent: {}", block.height(), block.hash(), block.parent_hash());
    Ok(())
}
