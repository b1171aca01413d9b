//! Single-font PDF receipt.
//!
//! Receipts are plain text laid out on A4 pages in Helvetica, so the PDF is
//! written directly: a catalog, one font, and a page plus content stream per
//! page. Text is limited to printable ASCII; anything else is replaced with
//! `?` because the standard fonts have no rupee sign or Indic glyphs.

use std::fmt::Write as _;

use kec_core::money;

use crate::models::Order;

const PAGE_WIDTH: i32 = 595;
const PAGE_HEIGHT: i32 = 842;
const TOP: i32 = 800;
const BOTTOM: i32 = 60;
const LEFT: i32 = 40;

/// Column x positions of the item table.
const COL_QTY: i32 = 300;
const COL_PRICE: i32 = 360;
const COL_TOTAL: i32 = 460;

/// Render the receipt for `order`.
#[must_use]
pub fn render(order: &Order, store_name: &str) -> Vec<u8> {
    let mut page = Canvas::new();
    let contact = &order.contact;

    page.text(LEFT, 16, &format!("{store_name} - Payment Receipt"));
    page.down(30);
    page.text(LEFT, 12, &format!("Order ID: {}", order.id));
    page.down(18);
    page.text(LEFT, 12, &format!("Date: {}", order.created_at.format("%d %b %Y %H:%M UTC")));
    page.down(18);
    page.text(LEFT, 12, &format!("Name: {}", contact.full_name));
    page.down(18);
    page.text(LEFT, 12, &format!("Email: {}", contact.email));
    page.down(18);
    page.text(LEFT, 12, &format!("Phone: {}", contact.phone));
    page.down(18);
    page.text(
        LEFT,
        12,
        &format!(
            "Address: {}, {} - {}",
            contact.address, contact.city, contact.postal_code
        ),
    );
    page.down(30);

    page.text(LEFT, 12, "Product");
    page.text(COL_QTY, 12, "Qty");
    page.text(COL_PRICE, 12, "Price");
    page.text(COL_TOTAL, 12, "Total");
    page.down(20);

    for item in &order.items {
        page.text(LEFT, 11, &item.product_name);
        page.text(COL_QTY, 11, &item.quantity.to_string());
        page.text(COL_PRICE, 11, &format!("Rs. {}", money::format_amount(item.price)));
        page.text(
            COL_TOTAL,
            11,
            &format!("Rs. {}", money::format_amount(item.subtotal())),
        );
        page.down(18);
    }

    page.down(12);
    page.text(
        LEFT,
        13,
        &format!("Total Amount Paid: Rs. {}", money::format_amount(order.total())),
    );
    page.down(20);
    page.text(
        LEFT,
        12,
        &format!("Payment Method: {}", order.payment_method.label()),
    );
    page.down(18);
    if let Some(payment_id) = order.payment_id() {
        page.text(LEFT, 12, &format!("Payment ID: {payment_id}"));
        page.down(18);
    }
    page.down(12);
    page.text(LEFT, 12, &format!("Thank you for shopping with {store_name}!"));

    page.finish()
}

/// Accumulates text operations, breaking onto a new page near the bottom.
struct Canvas {
    pages: Vec<String>,
    current: String,
    y: i32,
}

impl Canvas {
    const fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: String::new(),
            y: TOP,
        }
    }

    fn text(&mut self, x: i32, size: u8, text: &str) {
        let _ = writeln!(
            self.current,
            "BT /F1 {size} Tf {x} {} Td ({}) Tj ET",
            self.y,
            escape(text)
        );
    }

    fn down(&mut self, dy: i32) {
        self.y -= dy;
        if self.y < BOTTOM {
            self.pages.push(std::mem::take(&mut self.current));
            self.y = TOP;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }

        // 1 catalog, 2 page tree, 3 font, then a page and its content per page.
        let kids = (0..self.pages.len())
            .map(|i| format!("{} 0 R", 4 + 2 * i))
            .collect::<Vec<_>>()
            .join(" ");

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", self.pages.len()),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];
        for (i, content) in self.pages.iter().enumerate() {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                5 + 2 * i
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{content}endstream",
                content.len()
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n{body}\nendobj\n", i + 1);
        }

        let xref = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = writeln!(out, "{offset:010} 00000 n ");
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        );

        out.into_bytes()
    }
}

/// Escape a string for a PDF literal, keeping printable ASCII only.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
