//! PDF invoices.
//!
//! ```text
//! ┌────────────────────────────── A4 ──────────────────────────────┐
//! │ INVOICE                                                        │
//! │ Order ORD-20240315-9F1C02AB            Date 2024-03-15         │
//! │ Customer ana (ana@example.com)                                 │
//! │                                                                │
//! │ SKU        Product                    Qty   Unit     Total     │
//! │ SKU-1      Widget                       2   10.00    20.00     │
//! │ ...        (continues on a new page when the page is full)     │
//! │                                                                │
//! │                                  Subtotal            20.00     │
//! │                                  VAT                  4.00     │
//! │                                  Shipping             5.00     │
//! │                                  Total               29.00     │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use shopdesk_core::{Money, Order, OrderItem};

use crate::error::{ApiError, ApiResult};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 7.0;
const BODY_SIZE: f32 = 10.0;

const COL_SKU: f32 = MARGIN;
const COL_NAME: f32 = 55.0;
const COL_QTY: f32 = 125.0;
const COL_UNIT: f32 = 145.0;
const COL_TOTAL: f32 = 170.0;

/// Longest product name printed before truncation.
const NAME_WIDTH_CHARS: usize = 36;

/// File name used for downloads and email attachments.
pub fn invoice_filename(order: &Order) -> String {
    format!("invoice-{}.pdf", order.order_number)
}

/// Cursor over the pages of one document.
struct Writer<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl Writer<'_> {
    fn text(&self, text: &str, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, BODY_SIZE, Mm(x), Mm(self.y), font);
    }

    fn advance(&mut self) {
        self.y -= LINE_HEIGHT;
        if self.y < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Invoice");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn table_header(&mut self) {
        self.text("SKU", COL_SKU, true);
        self.text("Product", COL_NAME, true);
        self.text("Qty", COL_QTY, true);
        self.text("Unit", COL_UNIT, true);
        self.text("Total", COL_TOTAL, true);
        self.advance();
    }

    fn total_row(&mut self, label: &str, amount: Money, bold: bool) {
        self.text(label, COL_UNIT - 25.0, bold);
        self.text(&amount.to_string(), COL_TOTAL, bold);
        self.advance();
    }
}

fn truncate(name: &str) -> String {
    if name.chars().count() <= NAME_WIDTH_CHARS {
        name.to_string()
    } else {
        let mut short: String = name.chars().take(NAME_WIDTH_CHARS - 3).collect();
        short.push_str("...");
        short
    }
}

fn pdf_error(e: printpdf::Error) -> ApiError {
    ApiError::internal(format!("Failed to render invoice: {e}"))
}

/// Renders the invoice for an order as PDF bytes.
pub fn render_invoice(order: &Order, items: &[OrderItem]) -> ApiResult<Vec<u8>> {
    let title = format!("Invoice {}", order.order_number);
    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Invoice");

    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;

    let mut w = Writer {
        layer: doc.get_page(page).get_layer(layer),
        doc: &doc,
        regular,
        bold,
        y: PAGE_HEIGHT - MARGIN,
    };

    w.layer.use_text("INVOICE", 20.0, Mm(MARGIN), Mm(w.y), &w.bold);
    w.y -= 12.0;

    w.text(&format!("Order {}", order.order_number), MARGIN, false);
    w.text(
        &format!("Date {}", order.created_at.format("%Y-%m-%d")),
        COL_UNIT - 25.0,
        false,
    );
    w.advance();

    let customer = match &order.customer_email {
        Some(email) => format!("Customer {} ({})", order.customer_username, email),
        None => format!("Customer {}", order.customer_username),
    };
    w.text(&customer, MARGIN, false);
    w.advance();
    w.advance();

    w.table_header();
    for item in items {
        w.text(&item.sku_snapshot, COL_SKU, false);
        w.text(&truncate(&item.name_snapshot), COL_NAME, false);
        w.text(&item.quantity.to_string(), COL_QTY, false);
        w.text(&Money::from_cents(item.unit_price_cents).to_string(), COL_UNIT, false);
        w.text(&Money::from_cents(item.line_total_cents).to_string(), COL_TOTAL, false);
        w.advance();
    }

    w.advance();
    w.total_row("Subtotal", Money::from_cents(order.subtotal_cents), false);
    w.total_row("VAT", Money::from_cents(order.tax_cents), false);
    w.total_row("Shipping", Money::from_cents(order.shipping_cents), false);
    w.total_row("Total", Money::from_cents(order.total_cents), true);

    drop(w);
    doc.save_to_bytes().map_err(pdf_error)
}
