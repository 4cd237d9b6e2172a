use resp::RespDecoder;

fn main() {
	println!("--- RESP Streaming Decode Example ---");

	// Simulate a TCP stream with fragmented data
	// We are receiving:
	// - A Simple String: "+OK\r\n"
	// - An Integer: ":1000\r\n"
	// - An Array: "*2\r\n$3\r\nGET\r\n$-1\r\n"
	// - But split into arbitrary chunks.
	let data_chunks = vec![
		b"+O".as_slice(),
		b"K\r\n:1".as_slice(),
		b"00".as_slice(),
		b"0\r\n*2\r\n$3\r\nGE".as_slice(),
		b"T\r\n$-".as_slice(),
		b"1\r\n".as_slice(),
	];

	let mut decoder = RespDecoder::new();

	for (i, chunk) in data_chunks.iter().enumerate() {
		println!(
			"\n[Stream] Received Chunk {}: {:?}",
			i,
			String::from_utf8_lossy(chunk)
		);

		let mut complete = 0;
		for value in decoder.feed(chunk) {
			match value {
				Ok(value) => {
					complete += 1;
					println!("[Decoder] Complete: {:?}", value);
				}
				Err(e) => {
					eprintln!("[Decoder] Error: {}", e);
					return;
				}
			}
		}
		if complete == 0 {
			println!(
				"[Decoder] Incomplete, {} bytes buffered, waiting for more data...",
				decoder.buffered()
			);
		}
	}
}
