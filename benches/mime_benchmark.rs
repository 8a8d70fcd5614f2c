use criterion::{black_box, criterion_group, criterion_main, Criterion};

use integrations_framework::mime::synthesizer::scan_content_ids;
use integrations_framework::{BodySynthesizer, DataPart, Email, TextPart};

fn html_body(images: usize) -> String {
    let mut html = String::from("<html><body><table>");
    for i in 0..images {
        html.push_str(&format!("<tr><td background=\"cid:bg{i}.png\"><img src=\"cid:img{i}.gif\"></td></tr>"));
    }
    html.push_str("</table></body></html>");
    html
}

fn parts(images: usize) -> Vec<DataPart> {
    let mut parts = Vec::new();
    for i in 0..images {
        parts.push(
            DataPart::new(vec![0x47; 2048])
                .with_name(format!("img{i}.gif"))
                .as_inline(),
        );
    }
    parts.push(DataPart::new(vec![0x25; 16 * 1024]).with_name("report.pdf"));
    parts
}

fn bench_scan(c: &mut Criterion) {
    let html = html_body(20);
    c.bench_function("scan_content_ids_20_images", |b| {
        b.iter(|| scan_content_ids(black_box(&html)))
    });
}

fn bench_synthesize(c: &mut Criterion) {
    let synthesizer = BodySynthesizer::default();
    let text = TextPart::new("Plain text alternative");
    let html = TextPart::html(html_body(10));
    let parts = parts(10);

    c.bench_function("synthesize_related_mixed", |b| {
        b.iter(|| {
            synthesizer
                .synthesize(Some(black_box(&text)), Some(black_box(&html)), black_box(&parts))
                .unwrap()
        })
    });
}

fn bench_render(c: &mut Criterion) {
    let mut email = Email::new();
    email
        .add_from(["sender@example.com"])
        .unwrap()
        .add_to(["recipient@example.com"])
        .unwrap();
    email.set_subject("Benchmark").set_text("Plain text").set_html(html_body(5));
    for part in parts(5) {
        email.add_part(part);
    }

    c.bench_function("render_message_bytes", |b| {
        b.iter(|| email.to_message_bytes().unwrap())
    });
}

criterion_group!(benches, bench_scan, bench_synthesize, bench_render);
criterion_main!(benches);
