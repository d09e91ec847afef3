use ccmod::midi::{MidirTransport, Transport};

pub fn midi(client_name: &str) -> anyhow::Result<()> {
    println!("=== MIDI Output Devices ===");
    let transport = MidirTransport::new(client_name)?;
    let outputs = transport.outputs()?;
    if outputs.is_empty() {
        println!("  (none found)");
    }
    for output in &outputs {
        println!("  [{}] {}", output.id, output.name);
    }
    Ok(())
}
