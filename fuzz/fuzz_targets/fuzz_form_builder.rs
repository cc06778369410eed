#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use tokio::runtime::Runtime;
use tokio_formdata::FormBuilder;

fuzz_target!(|data: &[u8]| {
    let rt = Runtime::new().unwrap();

    rt.block_on(async {
        let mut text_form = FormBuilder::new();
        let mut mixed_form = FormBuilder::new();

        // Each 0xFF-separated chunk becomes a part; odd chunks are files in the mixed form
        for (i, chunk) in data.split(|&b| b == 0xFF).take(64).enumerate() {
            let value = String::from_utf8_lossy(chunk);
            let name = format!("field{}", i);
            text_form.add_text_part(&name, &value).unwrap();

            if i % 2 == 1 {
                mixed_form
                    .add_file_part(&name, "fuzz.bin", Cursor::new(chunk.to_vec()))
                    .unwrap();
            } else {
                mixed_form.add_text_part(&name, &value).unwrap();
            }
        }

        let length = text_form.content_length();
        let mut body = Vec::new();
        let written = text_form.write_to(&mut body).await.unwrap();
        assert_eq!(length, Some(body.len() as u64));
        assert_eq!(written, body.len() as u64);

        let mut body = Vec::new();
        let written = mixed_form.write_to(&mut body).await.unwrap();
        assert_eq!(written, body.len() as u64);
        if !body.is_empty() {
            assert!(body.starts_with(format!("--{}\r\n", mixed_form.boundary()).as_bytes()));
            assert!(body.ends_with(format!("\r\n--{}--\r\n", mixed_form.boundary()).as_bytes()));
        }
    });
});
