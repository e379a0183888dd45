pub mod mercadopago;
